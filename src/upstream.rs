//! Upstream fetch client
//!
//! The fan-out engine only needs one capability from the upstream: fetch the item at
//! an index and hand back its body or a typed failure. [`ItemFetcher`] is that seam;
//! [`HttpFetcher`] implements it with a single long-lived `reqwest::Client`, built
//! once at startup and shared by every request so connections are pooled.

use crate::config::UpstreamConfig;
use crate::error::{Result, UpstreamCause, UpstreamError};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Fetch-by-index access to the upstream item source
///
/// Implementations must never panic on upstream failures; every failure is returned
/// as an [`UpstreamError`] carrying the requested index.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    /// Fetch the item at `index`
    async fn fetch(&self, index: usize) -> std::result::Result<Bytes, UpstreamError>;
}

/// HTTP implementation of [`ItemFetcher`]: `GET <base_url><index>`
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build the fetcher and its connection pool from config
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Use an existing client (tests, or embedding programs that already own one)
    pub fn with_client(client: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            timeout: config.timeout,
        }
    }

    /// URL of the item at `index`
    pub fn item_url(&self, index: usize) -> String {
        format!("{}{}", self.base_url, index)
    }

    fn classify(&self, index: usize, error: reqwest::Error) -> UpstreamError {
        let cause = if error.is_timeout() {
            UpstreamCause::Timeout(self.timeout)
        } else if error.is_connect() || error.is_request() {
            UpstreamCause::Connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            UpstreamCause::Body(error.to_string())
        } else {
            UpstreamCause::Connect(error.to_string())
        };
        UpstreamError::new(index, cause)
    }
}

#[async_trait]
impl ItemFetcher for HttpFetcher {
    async fn fetch(&self, index: usize) -> std::result::Result<Bytes, UpstreamError> {
        let url = self.item_url(index);
        tracing::trace!(index, url = %url, "fetching upstream item");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(index, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::new(
                index,
                UpstreamCause::Status(status.as_u16()),
            ));
        }

        response.bytes().await.map_err(|e| self.classify(index, e))
    }
}
