//! Periodic job abstraction and the leader gate wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error::Result;
use crate::leader::LeaderGate;

/// A unit of periodic work.
///
/// `run` is awaited to completion before the next tick of the same job.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}

/// Runs the inner job only on the elected leader.
///
/// A tick on a non-leader is skipped silently.
pub struct LeaderGated<J> {
    inner: J,
    gate: Arc<dyn LeaderGate>,
}

impl<J: Job> LeaderGated<J> {
    pub fn new(inner: J, gate: Arc<dyn LeaderGate>) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl<J: Job> Job for LeaderGated<J> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn run(&self) -> Result<()> {
        if !self.gate.is_leader().await {
            debug!(job = self.inner.name(), "Not leader, skipping tick");
            return Ok(());
        }
        self.inner.run().await
    }
}
