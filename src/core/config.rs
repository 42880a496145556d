// src/core/config.rs

use crate::core::errors::ConfigError;
use crate::core::models::Protocol;
use std::time::Duration;
use strum::IntoEnumIterator;
use url::Url;

pub const DEFAULT_SINK_URL: &str = "http://127.0.0.1:5000/insert";

/// Immutable settings shared by every stage of a scan.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Endpoint receiving one JSON array per chunk.
    pub sink_url: String,
    /// Port for certificate fetches and `https://` probes.
    pub tls_port: u16,
    /// Port for `http://` probes.
    pub http_port: u16,
    /// Upper bound for a single certificate fetch or HTTP probe.
    pub timeout: Duration,
    pub sink_timeout: Duration,
    pub chunk_size: usize,
    /// Simultaneous HTTP connections within a chunk.
    pub max_concurrent: usize,
    /// Simultaneous host checks within a chunk.
    pub host_check_limit: usize,
    /// Blocking threads available to TLS handshakes.
    pub tls_workers: usize,
    pub protocols: Vec<Protocol>,
    /// Drop repeated addresses, keeping the first occurrence.
    pub deduplicate: bool,
    pub user_agent: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sink_url: DEFAULT_SINK_URL.to_string(),
            tls_port: 443,
            http_port: 80,
            timeout: Duration::from_secs(5),
            sink_timeout: Duration::from_secs(60),
            chunk_size: 10_000,
            max_concurrent: 100,
            host_check_limit: 90,
            tls_workers: 64,
            protocols: Protocol::iter().collect(),
            deduplicate: false,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("chunk size", self.chunk_size),
            ("max concurrent connections", self.max_concurrent),
            ("host check limit", self.host_check_limit),
            ("TLS worker count", self.tls_workers),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(*name));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Zero("timeout"));
        }
        if self.protocols.is_empty() {
            return Err(ConfigError::NoProtocols);
        }
        match Url::parse(&self.sink_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(url) => Err(ConfigError::SinkUrl {
                url: self.sink_url.clone(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            }),
            Err(e) => Err(ConfigError::SinkUrl { url: self.sink_url.clone(), reason: e.to_string() }),
        }
    }

    /// Default port for a protocol.
    pub fn port_for(&self, protocol: Protocol) -> u16 {
        match protocol {
            Protocol::Plain => self.http_port,
            Protocol::Secure => self.tls_port,
        }
    }
}
