//! Article HTML fetching
//!
//! News sites commonly reject obvious bot user agents, so the fetcher
//! presents a browser UA string. The trait seam lets pipeline tests run
//! against canned HTML without a network.

use async_trait::async_trait;
use newsrag_common::errors::{AppError, Result};
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Fetches raw HTML for an article URL
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

/// Production fetcher backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::FetchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchFailed {
                url: url.to_string(),
                message: format!("HTTP status {}", status),
            });
        }

        response.text().await.map_err(|e| AppError::FetchFailed {
            url: url.to_string(),
            message: format!("Failed to read body: {}", e),
        })
    }
}
