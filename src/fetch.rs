// src/fetch.rs
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::CheckError;

/// Retrieves raw markup for a page locator.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<String, CheckError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("nrb-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<String, CheckError> {
        let failed = |reason: String| CheckError::RetrievalFailed {
            locator: locator.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| failed(e.to_string()))?;
        tracing::debug!(locator, bytes = body.len(), "page fetched");
        Ok(body)
    }
}

/// Serves canned markup per locator; unknown locators fail like a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, locator: &str, markup: &str) -> Self {
        self.pages.insert(locator.to_string(), markup.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, locator: &str) -> Result<String, CheckError> {
        self.pages
            .get(locator)
            .cloned()
            .ok_or_else(|| CheckError::RetrievalFailed {
                locator: locator.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}
