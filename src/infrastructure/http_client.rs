//! HTTP fetcher for product images.
//!
//! The dedup/persistence step pulls image bytes over plain HTTP (the browser
//! session only supplies the `src` URL). Kept behind a trait so the workflow
//! is testable without network access.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::debug;

/// Image fetch configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "supplement-scraper/0.2 (Educational Purpose)".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Fetches a binary resource by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Production fetcher over reqwest.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "HTTP request failed with status {}: {}",
                response.status(),
                url
            );
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;

        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}
