//! Leader election via the sidecar elector.
//!
//! The elector answers `GET <elector>` with `{"name": "<pod hostname>"}`.
//! An instance is leader when that name equals its own hostname. Any failure
//! to ask counts as "not leader", so replicas never run gated work twice.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors talking to the elector.
#[derive(Debug, Error)]
pub enum LeaderError {
    #[error("elector request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("elector returned status {0}")]
    Status(u16),
}

/// Decides whether this instance may run leader-only work.
#[async_trait]
pub trait LeaderGate: Send + Sync {
    async fn is_leader(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct ElectorResponse {
    name: String,
}

/// HTTP client for the leader-election sidecar.
#[derive(Debug, Clone)]
pub struct LeaderElection {
    http: reqwest::Client,
    elector_url: Option<String>,
    hostname: String,
}

impl LeaderElection {
    /// Create a client. With no elector configured the instance is always leader.
    pub fn new(
        elector: Option<&str>,
        hostname: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LeaderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            elector_url: elector.map(normalize_url),
            hostname: hostname.into(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Ask the elector for the current leader's name.
    ///
    /// Returns `Ok(None)` when no elector is configured.
    pub async fn current_leader(&self) -> Result<Option<String>, LeaderError> {
        let Some(url) = &self.elector_url else {
            return Ok(None);
        };

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LeaderError::Status(response.status().as_u16()));
        }

        let body: ElectorResponse = response.json().await?;
        Ok(Some(body.name.trim().to_string()))
    }
}

#[async_trait]
impl LeaderGate for LeaderElection {
    async fn is_leader(&self) -> bool {
        match self.current_leader().await {
            Ok(None) => true,
            Ok(Some(leader)) => {
                let leading = leader == self.hostname;
                debug!(leader = %leader, hostname = %self.hostname, leading, "Leader check");
                leading
            }
            Err(e) => {
                warn!(error = %e, "Leader check failed, assuming not leader");
                false
            }
        }
    }
}

/// The sidecar address is often given as bare `host:port`.
fn normalize_url(elector: &str) -> String {
    let elector = elector.trim();
    if elector.starts_with("http://") || elector.starts_with("https://") {
        elector.to_string()
    } else {
        format!("http://{elector}")
    }
}
