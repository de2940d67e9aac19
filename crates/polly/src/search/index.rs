//! Search index client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::error::{Result, SearchError};

/// Document API of an external search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Create or replace a document.
    async fn put(&self, index: &str, id: &str, document: &serde_json::Value) -> Result<()>;

    /// Remove a document. Removing an absent document succeeds.
    async fn remove(&self, index: &str, id: &str) -> Result<()>;
}

/// HTTP client for an Elasticsearch-style `/{index}/_doc/{id}` API.
pub struct HttpSearchIndex {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpSearchIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| SearchError::InvalidUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(SearchError::InvalidUrl(format!("{base_url}: not a base url")));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    /// Index name and document id each become one percent-encoded segment.
    fn doc_url(&self, index: &str, id: &str) -> Url {
        let mut url = self.base_url.clone();
        // Only fails for cannot-be-a-base urls, which `new` rejects.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([index, "_doc", id]);
        }
        url
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn put(&self, index: &str, id: &str, document: &serde_json::Value) -> Result<()> {
        let response = self
            .http
            .put(self.doc_url(index, id))
            .json(document)
            .send()
            .await?;
        check(response).await?;
        debug!(index, id, "Document indexed");
        Ok(())
    }

    async fn remove(&self, index: &str, id: &str) -> Result<()> {
        let response = self.http.delete(self.doc_url(index, id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(index, id, "Document already absent from index");
            return Ok(());
        }
        check(response).await?;
        debug!(index, id, "Document removed from index");
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(SearchError::Rejected {
        status: status.as_u16(),
        message,
    })
}
