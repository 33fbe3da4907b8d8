//! HTTP transport abstraction.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};

/// Abstraction over the remote store for testability.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and decodes the body as text.
    async fn fetch_text(&self, url: &Url) -> Result<String>;

    /// Fetches `url` and returns the raw body.
    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes>;

    /// Checks whether `url` exists without downloading it.
    ///
    /// Never fails: any transport error reads as "absent".
    async fn exists(&self, url: &Url) -> bool;
}

/// Default fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a pooled keep-alive client.
    ///
    /// No request timeout is set; a stalled fetch waits for the transport
    /// to give up.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio-dl/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let response = self.client.get(url.clone()).send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Error::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
        Ok(self.get(url).await?.bytes().await?)
    }

    async fn exists(&self, url: &Url) -> bool {
        match self.client.head(url.clone()).send().await {
            Ok(response) if response.status().is_success() => true,
            // Some static hosts refuse HEAD; fall back to a plain GET.
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
                self.get(url).await.is_ok()
            }
            Ok(response) => {
                log::debug!("Probe {url}: HTTP {}", response.status());
                false
            }
            Err(e) => {
                log::debug!("Probe {url} failed: {e}");
                false
            }
        }
    }
}
