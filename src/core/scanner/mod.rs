// src/core/scanner/mod.rs

// Public interface of the scanning engine. Stages, leaves first.
pub mod domain_validator;
pub mod certificate_scanner;
pub mod http_scanner;
pub mod site_checker;
pub mod batch_scanner;

#[cfg(test)]
pub(crate) mod test_support;

use crate::core::config::ScannerConfig;
use crate::core::discovery::read_discovery_input;
use crate::core::errors::ScanError;
use crate::core::models::ScanSummary;
use self::batch_scanner::BatchScanner;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Scans every host listed in the discovery output at `input`.
///
/// Reading the input happens before any network activity, so a missing file
/// aborts the run without probing anything. Chunks are then processed one
/// after another, each one published before the next begins.
///
/// # Arguments
///
/// * `config` - Settings shared by every stage.
/// * `input` - Discovery output to extract IPv4 candidates from.
/// * `stop` - Raised by the signal handler; checked between chunks.
pub async fn run_full_scan(
    config: Arc<ScannerConfig>,
    input: &Path,
    stop: Arc<AtomicBool>,
) -> Result<ScanSummary, ScanError> {
    let text = read_discovery_input(input).await?;
    let scanner = BatchScanner::new(config, stop)?;
    scanner.run(&text).await
}
