use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use crate::error::{AppError, FetchError};

use super::request::redact_url;
use super::FetchResult;

/// Anything that can turn a URL into a parsed JSON document.
#[async_trait]
pub trait JsonSource: Send + Sync {
    async fn fetch_json(&self, url: &str) -> FetchResult<Value>;
}

/// Single GET + JSON parse over reqwest. No retries; callers own that policy.
#[derive(Debug, Clone)]
pub struct HttpJsonClient {
    client: Client,
}

impl HttpJsonClient {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("marketdata/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonSource for HttpJsonClient {
    async fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        debug!("GET {}", redact_url(url));

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: redact_url(url),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
