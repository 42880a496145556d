// src/core/publisher.rs

use tracing::{info, warn};

use crate::core::config::ScannerConfig;
use crate::core::errors::PublishError;
use crate::core::models::HostFindings;
use reqwest::{Client, StatusCode};

/// Delivers completed chunks to the ingestion sink, one POST per chunk.
#[derive(Debug, Clone)]
pub struct SinkPublisher {
    client: Client,
    url: String,
}

impl SinkPublisher {
    pub fn new(config: &ScannerConfig) -> Result<Self, PublishError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(true)
            .timeout(config.sink_timeout)
            .build()
            .map_err(PublishError::Client)?;
        Ok(Self { client, url: config.sink_url.clone() })
    }

    /// Sends `findings` as a single JSON array and returns the sink's status.
    ///
    /// Non-success statuses are returned, not turned into errors; there is no
    /// retry.
    pub async fn publish(&self, findings: &[HostFindings]) -> Result<StatusCode, PublishError> {
        let response = self.client.post(&self.url).json(findings).send().await?;
        let status = response.status();
        if status.is_success() {
            info!(status = %status, hosts = findings.len(), "Chunk published.");
        } else {
            warn!(status = %status, hosts = findings.len(), "Sink rejected chunk.");
        }
        Ok(status)
    }
}
