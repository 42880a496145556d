// src/core/errors.rs

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Failures around the discovery input. All of them are fatal.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery input not found: {}", .0.display())]
    InputMissing(PathBuf),
    #[error("failed to read discovery input {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch discovery tool `{bin}`: {source}")]
    ToolSpawn {
        bin: String,
        #[source]
        source: io::Error,
    },
    #[error("discovery tool exited with {status}")]
    ToolFailed { status: ExitStatus },
    #[error("failed waiting for discovery tool: {0}")]
    ToolWait(#[source] io::Error),
    #[error("discovery interrupted by signal")]
    Interrupted,
}

/// Why a certificate could not be read from a host. Never surfaced past the
/// certificate scanner; kept for logging.
#[derive(Debug, Error)]
pub enum CertificateProbeError {
    #[error("TLS connector setup failed: {0}")]
    Connector(#[from] native_tls::Error),
    #[error("TCP connection failed: {0}")]
    Connect(#[from] io::Error),
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
    #[error("peer presented no certificate")]
    NoCertificate,
    #[error("X.509 parse error: {0}")]
    Parse(String),
    #[error("certificate subject has no common name")]
    NoCommonName,
    #[error("handshake worker failed: {0}")]
    Worker(String),
}

/// Why an HTTP probe produced no record. Never surfaced past the HTTP scanner.
#[derive(Debug, Error)]
pub enum HttpProbeError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(reqwest::Error),
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("failed to read body: {0}")]
    Body(reqwest::Error),
}

impl From<reqwest::Error> for HttpProbeError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            HttpProbeError::Timeout
        } else if error.is_connect() {
            HttpProbeError::Connect(error)
        } else if error.is_body() || error.is_decode() {
            HttpProbeError::Body(error)
        } else {
            HttpProbeError::Request(error)
        }
    }
}

/// Delivery failures of a chunk to the sink.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to build sink client: {0}")]
    Client(reqwest::Error),
    #[error("sink request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Failures that stop a scan as a whole.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("failed to build probe client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("at least one protocol must be probed")]
    NoProtocols,
    #[error("invalid sink URL `{url}`: {reason}")]
    SinkUrl { url: String, reason: String },
}
