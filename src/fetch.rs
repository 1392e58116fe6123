//! Network fetch capability
//!
//! The orchestrator and asset cache only see the [`Fetcher`] trait so tests
//! can substitute scripted fakes. [`HttpFetcher`] is the real implementation
//! on top of the global HTTP client. A single attempt is made per call.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::globals::get_http_client;

/// Transport-level failure; the only error that leaves a search pass
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a page as text
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch raw bytes (images)
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher backed by the shared reqwest client
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    async fn get(&self, url: &str, accept: &str) -> Result<reqwest::Response, FetchError> {
        let client = get_http_client();

        let response = client
            .get(url)
            .header("Accept", accept)
            .header("Accept-Language", "fa-IR,fa;q=0.9,en-US;q=0.8,en;q=0.7")
            .send()
            .await
            .map_err(|e| {
                warn!(url, error = %e, "request failed");
                FetchError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        debug!(url, status = status.as_u16(), "fetched");
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.get(url, "text/html,application/xhtml+xml")
            .await?
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .get(url, "image/avif,image/webp,image/*,*/*;q=0.8")
            .await?
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(FetchError::Status(503).to_string(), "server returned status 503");
        assert_eq!(
            FetchError::Request("dns error".into()).to_string(),
            "request failed: dns error"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let result = HttpFetcher.fetch_text("http://127.0.0.1:9/nothing").await;
        assert!(matches!(result, Err(FetchError::Request(_))));
    }
}
