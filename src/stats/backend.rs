use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use super::types::{TimeDataResponse, TimeDataUpload, TimeRecord};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

const TIME_DATA_PATH: &str = "time-data";

/// Where finished episodes go and where the dashboard reads them back.
#[async_trait]
pub trait StatsBackend: Send + Sync {
    async fn record_duration(&self, seconds: u64) -> Result<()>;
    async fn fetch_records(&self) -> Result<Vec<TimeRecord>>;
}

#[derive(Clone)]
pub struct HttpStatsBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStatsBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(anyhow!("backend url must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{base}/{TIME_DATA_PATH}"),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StatsBackend for HttpStatsBackend {
    async fn record_duration(&self, seconds: u64) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(&TimeDataUpload { seconds })
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("POST {} rejected", self.endpoint))?;

        log_debug!("recorded {seconds}s at {}", self.endpoint);
        Ok(())
    }

    async fn fetch_records(&self) -> Result<Vec<TimeRecord>> {
        let response: TimeDataResponse = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("GET {} rejected", self.endpoint))?
            .json()
            .await
            .context("malformed time-data response")?;

        Ok(response.data)
    }
}
