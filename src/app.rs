// src/app.rs

use crate::core::config::{DEFAULT_SINK_URL, ScannerConfig};
use crate::core::discovery::{DiscoveryFile, MasscanRunner};
use crate::core::errors::ConfigError;
use crate::core::models::Protocol;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Probes hosts found by a port scan for HTTP and HTTPS services and ships
/// the findings to an ingestion sink.
#[derive(Debug, Parser)]
#[command(name = "certsweep", version, about)]
pub struct Cli {
    /// Discovery output to scan, or the IP-range list when --masscan is set.
    pub input: PathBuf,

    /// Endpoint receiving one JSON array per chunk.
    #[arg(long, default_value = DEFAULT_SINK_URL)]
    pub sink_url: String,

    #[arg(long, default_value_t = 443)]
    pub tls_port: u16,

    #[arg(long, default_value_t = 80)]
    pub http_port: u16,

    /// Per-probe timeout in seconds.
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,

    /// Timeout for each sink POST in seconds.
    #[arg(long, default_value_t = 60)]
    pub sink_timeout: u64,

    #[arg(long, default_value_t = 10_000)]
    pub chunk_size: usize,

    /// Simultaneous HTTP connections per chunk.
    #[arg(long, default_value_t = 100)]
    pub max_concurrent: usize,

    /// Simultaneous host checks per chunk.
    #[arg(long, default_value_t = 90)]
    pub host_check_limit: usize,

    /// Threads available for blocking TLS handshakes.
    #[arg(long, default_value_t = 64)]
    pub tls_workers: usize,

    /// Protocol to probe (http or https). Repeat for several; defaults to both.
    #[arg(long = "protocol")]
    pub protocols: Vec<Protocol>,

    /// Probe each address once even if discovery lists it repeatedly.
    #[arg(long)]
    pub dedup: bool,

    /// Run masscan over INPUT first and scan its output.
    #[arg(long)]
    pub masscan: bool,

    #[arg(long, default_value = "masscan")]
    pub masscan_bin: String,

    #[arg(long, default_value_t = 10_000)]
    pub masscan_rate: u32,

    /// Where masscan writes its (temporary) results.
    #[arg(long, default_value = "masscanResults.txt")]
    pub masscan_output: PathBuf,
}

impl Cli {
    pub fn to_config(&self) -> Result<ScannerConfig, ConfigError> {
        let defaults = ScannerConfig::default();
        let protocols = if self.protocols.is_empty() {
            defaults.protocols.clone()
        } else {
            let mut protocols = self.protocols.clone();
            protocols.sort();
            protocols.dedup();
            protocols
        };
        let config = ScannerConfig {
            sink_url: self.sink_url.clone(),
            tls_port: self.tls_port,
            http_port: self.http_port,
            timeout: Duration::from_secs(self.timeout),
            sink_timeout: Duration::from_secs(self.sink_timeout),
            chunk_size: self.chunk_size,
            max_concurrent: self.max_concurrent,
            host_check_limit: self.host_check_limit,
            tls_workers: self.tls_workers,
            protocols,
            deduplicate: self.dedup,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// The masscan run requested on the command line, if any.
    pub fn masscan_runner(&self) -> Option<MasscanRunner> {
        self.masscan.then(|| MasscanRunner {
            bin: self.masscan_bin.clone(),
            ranges: self.input.clone(),
            output: self.masscan_output.clone(),
            port: self.tls_port,
            rate: self.masscan_rate,
        })
    }

    /// The discovery file to scan when masscan is not used.
    pub fn provided_input(&self) -> DiscoveryFile {
        DiscoveryFile::provided(self.input.clone())
    }
}
