// src/core/scanner/batch_scanner.rs

use tracing::{debug, error, info, warn};

use super::certificate_scanner::fetch_identities;
use super::http_scanner::HttpScanner;
use super::site_checker::SiteChecker;
use crate::core::config::ScannerConfig;
use crate::core::errors::ScanError;
use crate::core::models::{CandidateHost, ChunkResult, ScanSummary};
use crate::core::publisher::SinkPublisher;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Dotted quads without octet range checks.
static RE_IPV4: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+\.\d+\.\d+").unwrap());

/// Every dotted-quad substring of `text`, in order of appearance.
pub fn extract_candidates(text: &str) -> Vec<CandidateHost> {
    RE_IPV4.find_iter(text).map(|m| CandidateHost::new(m.as_str())).collect()
}

/// Drops repeated hosts, keeping the first occurrence of each.
pub fn deduplicate(hosts: Vec<CandidateHost>) -> Vec<CandidateHost> {
    let mut seen = HashSet::new();
    hosts.into_iter().filter(|h| seen.insert(h.clone())).collect()
}

/// Splits `hosts` into consecutive chunks of at most `size` hosts.
pub fn partition(hosts: &[CandidateHost], size: usize) -> impl Iterator<Item = &[CandidateHost]> {
    hosts.chunks(size.max(1))
}

/// Drives chunks through certificate fetch, site check and publish, one
/// chunk at a time.
#[derive(Debug)]
pub struct BatchScanner {
    config: Arc<ScannerConfig>,
    publisher: SinkPublisher,
    stop: Arc<AtomicBool>,
}

impl BatchScanner {
    pub fn new(config: Arc<ScannerConfig>, stop: Arc<AtomicBool>) -> Result<Self, ScanError> {
        let publisher = SinkPublisher::new(&config)?;
        Ok(Self { config, publisher, stop })
    }

    /// Scans every candidate found in `discovery_text`.
    ///
    /// A raised stop flag is honoured between chunks only; the chunk in
    /// flight always runs to its publish step.
    pub async fn run(&self, discovery_text: &str) -> Result<ScanSummary, ScanError> {
        let mut candidates = extract_candidates(discovery_text);
        let extracted = candidates.len();
        if self.config.deduplicate {
            candidates = deduplicate(candidates);
        }
        info!(extracted, candidates = candidates.len(), chunk_size = self.config.chunk_size, "Candidates loaded.");

        let mut summary = ScanSummary { candidates: candidates.len(), ..Default::default() };
        for (index, chunk) in partition(&candidates, self.config.chunk_size).enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                warn!(chunk = index, "Stop requested, skipping remaining chunks.");
                break;
            }
            info!(chunk = index, hosts = chunk.len(), "Scanning chunk.");

            let results = self.scan_chunk(chunk).await?;
            summary.chunks += 1;

            match self.publisher.publish(&results).await {
                Ok(status) if status.is_success() => summary.hosts_published += results.len(),
                Ok(_) => summary.failed_publishes += 1,
                Err(e) => {
                    error!(chunk = index, error = %e, "Failed to publish chunk.");
                    summary.failed_publishes += 1;
                }
            }
        }

        info!(
            chunks = summary.chunks,
            published = summary.hosts_published,
            failed_publishes = summary.failed_publishes,
            "Scan finished."
        );
        Ok(summary)
    }

    /// Certificate phase for the whole chunk, then site checks. The HTTP
    /// client and both limiters live only as long as this call.
    pub async fn scan_chunk(&self, chunk: &[CandidateHost]) -> Result<ChunkResult, ScanError> {
        let http = HttpScanner::new(self.config.clone())?;
        let checker = SiteChecker::new(http, &self.config.protocols, self.config.host_check_limit);

        let identities = fetch_identities(chunk, self.config.tls_port, self.config.timeout).await;
        let named = identities.iter().filter(|i| !i.common_name.is_empty()).count();
        debug!(hosts = chunk.len(), named, "Certificate phase complete.");

        let results: ChunkResult = join_all(identities.iter().map(|identity| checker.check(identity)))
            .await
            .into_iter()
            .flatten()
            .collect();
        info!(hosts = chunk.len(), responsive = results.len(), "Site checks complete.");
        Ok(results)
    }
}
