//! services/api/src/adapters/fetcher.rs
//!
//! Retrieval of remote assets for the download proxy.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAsset {
    pub data: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Upstream responded with status {0}")]
    Upstream(u16),
    #[error("Transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, FetchError>;
}

/// Fetches over HTTP(S) with a shared `reqwest` client.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "upstream refused download");
            return Err(FetchError::Upstream(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(FetchedAsset { data, content_type })
    }
}
