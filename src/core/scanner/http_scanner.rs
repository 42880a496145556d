// src/core/scanner/http_scanner.rs

use tracing::{debug, trace};

use crate::core::config::ScannerConfig;
use crate::core::errors::HttpProbeError;
use crate::core::models::{AddressingMode, ProbeRecord, ProbeVariant, RESPONSE_PREFIX_CHARS};
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, redirect};
use scraper::{Html, Selector};
use std::sync::Arc;
use tokio::sync::Semaphore;

static TITLE: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("title").ok());

const MAX_REDIRECTS: usize = 10;

/// Issues single GET probes for one chunk.
///
/// Owns the chunk's HTTP client and caps simultaneous connections with a
/// semaphore sized by `max_concurrent`. Dropped together with the chunk.
#[derive(Debug, Clone)]
pub struct HttpScanner {
    client: Client,
    connections: Arc<Semaphore>,
    config: Arc<ScannerConfig>,
}

impl HttpScanner {
    pub fn new(config: Arc<ScannerConfig>) -> Result<Self, reqwest::Error> {
        let client = client_builder(&config).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Like [`HttpScanner::new`], but `domain` resolves to the loopback
    /// address.
    #[cfg(test)]
    pub(crate) fn resolving_to_loopback(config: Arc<ScannerConfig>, domain: &str) -> Result<Self, reqwest::Error> {
        let loopback = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
        let client = client_builder(&config).resolve(domain, loopback).build()?;
        Ok(Self::with_client(client, config))
    }

    fn with_client(client: Client, config: Arc<ScannerConfig>) -> Self {
        Self {
            client,
            connections: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
        }
    }

    /// Probes one variant. Any failure yields `None`.
    pub async fn probe(&self, variant: ProbeVariant, ip: &str, domain: &str) -> Option<ProbeRecord> {
        let url = self.target_url(variant, ip, domain);
        match self.fetch(&url).await {
            Ok(body) => Some(build_record(url, ip, domain, &body)),
            Err(reason) => {
                debug!(url = %url, reason = %reason, "HTTP probe failed.");
                None
            }
        }
    }

    /// Builds `<scheme><host>:<port>` with the protocol's configured port.
    pub fn target_url(&self, variant: ProbeVariant, ip: &str, domain: &str) -> String {
        let host = match variant.mode {
            AddressingMode::ByIp => ip,
            AddressingMode::ByDomain => domain,
        };
        format!("{}{}:{}", variant.protocol, host, self.config.port_for(variant.protocol))
    }

    async fn fetch(&self, url: &str) -> Result<String, HttpProbeError> {
        // The semaphore is never closed, so acquisition cannot fail.
        let _permit = self.connections.acquire().await.ok();
        trace!(url, "Sending GET.");
        let response = self.client.get(url).send().await?;
        trace!(url, status = %response.status(), "Received response.");
        Ok(response.text().await?)
    }
}

fn client_builder(config: &ScannerConfig) -> ClientBuilder {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(true)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(config.timeout)
        .pool_max_idle_per_host(0)
}

fn build_record(request: String, ip: &str, domain: &str, body: &str) -> ProbeRecord {
    ProbeRecord {
        title: extract_title(body).unwrap_or_default(),
        request,
        ip: ip.to_owned(),
        domain: domain.to_owned(),
        response_text: body.chars().take(RESPONSE_PREFIX_CHARS).collect(),
    }
}

/// Text of the first `<title>` element, if the body yields one.
pub fn extract_title(body: &str) -> Option<String> {
    let selector = TITLE.as_ref()?;
    let document = Html::parse_document(body);
    let title = document.select(selector).next()?;
    Some(title.text().collect::<String>())
}
