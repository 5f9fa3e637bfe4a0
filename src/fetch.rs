// src/fetch.rs
use crate::config::HttpConfig;
use crate::errors::FetchError;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

// ===== fetcher
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Single GET attempt returning the body as text.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

// ===== Live http fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client: Client = builder.build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        info!("HttpFetcher: fetching {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: response.status() });
        }
        let body: String = response.text().await?;
        debug!("HttpFetcher: {} returned {} bytes", url, body.len());
        Ok(body)
    }
}

// ===== Fake http fetcher for testing

/// Serves canned bodies by exact URL. Unknown URLs fail like a dead host.
/// Every requested URL is recorded, in order.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(url.to_string(), body.to_string());
        self
    }

    /// Holds the response for `url` back by `delay`.
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Failed(format!("no route to {}", url)))
    }
}
