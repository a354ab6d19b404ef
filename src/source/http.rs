//! HTTP implementation of [`TelemetrySource`] using `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

use super::TelemetrySource;
use crate::config::BackendConfig;
use crate::error::{BagwatchError, Result};

/// Backend client for the snapshot and history endpoints
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: Url,
}

impl HttpSource {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Fetch` if the URL cannot be parsed, cannot carry a path, or
    /// the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BagwatchError::Fetch(format!("Invalid backend URL {}: {}", base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(BagwatchError::Fetch(format!(
                "Backend URL {} cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Create a client from the `[backend]` config section
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// `GET /snapshot`
    pub fn snapshot_url(&self) -> Url {
        self.endpoint(&["snapshot"])
    }

    /// `GET /history/{bag_id}`, with the id percent-encoded as one segment
    pub fn history_url(&self, unit_id: &str) -> Url {
        self.endpoint(&["history", unit_id])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BagwatchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl TelemetrySource for HttpSource {
    async fn fetch_snapshot(&self) -> Result<Value> {
        self.get_json(self.snapshot_url()).await
    }

    async fn fetch_history(&self, unit_id: &str) -> Result<Value> {
        self.get_json(self.history_url(unit_id)).await
    }
}
