use super::{StatsSource, UsageCounter, UsageStats};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors talking to the remote stats service.
#[derive(Debug, thiserror::Error)]
pub enum RemoteSyncError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct IncrementRequest {
    kind: UsageCounter,
    count: u64,
}

/// HTTP client for a shared usage counter service.
#[derive(Debug, Clone)]
pub struct StatsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl StatsClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Add `count` to a remote counter and return the remote totals.
    pub async fn increment(
        &self,
        kind: UsageCounter,
        count: u64,
    ) -> Result<UsageStats, RemoteSyncError> {
        let url = format!("{}/usage/increment", self.base_url);
        let request = self
            .authorize(self.client.post(&url))
            .json(&IncrementRequest { kind, count });

        let response = check_status(request.send().await?).await?;
        Ok(remote_stats(response.json().await?))
    }

    /// Current remote totals.
    pub async fn fetch(&self) -> Result<UsageStats, RemoteSyncError> {
        let url = format!("{}/usage", self.base_url);
        let response = check_status(self.authorize(self.client.get(&url)).send().await?).await?;
        Ok(remote_stats(response.json().await?))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteSyncError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(RemoteSyncError::Status { status, body })
}

fn remote_stats(mut stats: UsageStats) -> UsageStats {
    stats.source = StatsSource::Remote;
    stats
}
