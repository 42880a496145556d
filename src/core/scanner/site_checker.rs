// src/core/scanner/site_checker.rs

use tracing::{debug, trace};

use super::domain_validator::is_valid_domain;
use super::http_scanner::HttpScanner;
use crate::core::models::{HostFindings, HostIdentity, ProbePlan, Protocol};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Chooses the probing policy for a certificate common name.
///
/// Wildcards and names that do not look like domains (including the empty
/// name left by a failed certificate fetch) are only probed by IP.
pub fn plan_for(common_name: &str) -> ProbePlan {
    if common_name.contains('*') || !is_valid_domain(common_name) {
        ProbePlan::IpOnly
    } else {
        ProbePlan::Full
    }
}

/// Runs the per-host probe policy for one chunk.
///
/// Every call to [`SiteChecker::check`] holds a permit of the host-check
/// limiter for its whole duration, so at most `limit` hosts are in flight.
#[derive(Debug, Clone)]
pub struct SiteChecker {
    http: HttpScanner,
    protocols: Arc<[Protocol]>,
    limiter: Arc<Semaphore>,
}

impl SiteChecker {
    pub fn new(http: HttpScanner, protocols: &[Protocol], limit: usize) -> Self {
        Self {
            http,
            protocols: protocols.into(),
            limiter: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Probes all variants selected for `identity` concurrently and keeps
    /// the successful ones. Returns `None` when nothing answered.
    pub async fn check(&self, identity: &HostIdentity) -> Option<HostFindings> {
        let _permit = self.limiter.acquire().await.ok();

        let plan = plan_for(&identity.common_name);
        let ip = identity.host.as_str();
        let domain = identity.common_name.as_str();
        let variants = plan.variants(&self.protocols);
        trace!(host = ip, ?plan, variants = variants.len(), "Checking site.");

        let outcomes = join_all(variants.iter().map(|&variant| async move {
            let record = self.http.probe(variant, ip, domain).await;
            (plan.key(&variant), record)
        }))
        .await;

        let findings: BTreeMap<_, _> = outcomes
            .into_iter()
            .filter_map(|(key, record)| record.map(|r| (key, r)))
            .collect();

        if findings.is_empty() {
            trace!(host = ip, "No variant answered.");
            return None;
        }
        let findings = HostFindings(findings);
        debug!(host = ip, answered = ?findings.keys().collect::<Vec<_>>(), "Site responded.");
        Some(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScannerConfig;
    use crate::core::models::CandidateHost;
    use crate::core::scanner::test_support::{CERT_COMMON_NAME, tls_server};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// HTTP responder that counts connections and holds each one for `delay`.
    async fn counting_server(delay: Duration) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_srv = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                hits_srv.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let body = "<title>ok</title>";
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (port, hits)
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    /// HTTP responder that records the most connections it held open at once.
    async fn peak_tracking_server(delay: Duration) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let peak_srv = peak.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                peak_srv.fetch_max(now, Ordering::SeqCst);
                let live = live.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let body = "<title>ok</title>";
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    // Released before the client can see the full response.
                    live.fetch_sub(1, Ordering::SeqCst);
                    let _ = socket.shutdown().await;
                });
            }
        });
        (port, peak)
    }

    fn test_config(http_port: u16, tls_port: u16) -> ScannerConfig {
        ScannerConfig {
            http_port,
            tls_port,
            timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn checker_with(config: ScannerConfig) -> SiteChecker {
        let config = Arc::new(config);
        let http = HttpScanner::new(config.clone()).unwrap();
        SiteChecker::new(http, &config.protocols, config.host_check_limit)
    }

    fn checker(http_port: u16, tls_port: u16, limit: usize) -> SiteChecker {
        checker_with(ScannerConfig { host_check_limit: limit, ..test_config(http_port, tls_port) })
    }

    #[test]
    fn wildcard_invalid_and_empty_names_use_ip_only() {
        assert_eq!(plan_for("*.example.com"), ProbePlan::IpOnly);
        assert_eq!(plan_for(""), ProbePlan::IpOnly);
        assert_eq!(plan_for("Fortinet Appliance"), ProbePlan::IpOnly);
        assert_eq!(plan_for("shop.example.com"), ProbePlan::Full);
    }

    #[test]
    fn variant_counts_follow_plan() {
        let protocols = [Protocol::Plain, Protocol::Secure];
        assert_eq!(plan_for("*.example.com").variants(&protocols).len(), 2);
        assert_eq!(plan_for("shop.example.com").variants(&protocols).len(), 4);
    }

    #[tokio::test]
    async fn wildcard_host_attempts_two_ip_variants() {
        // Plain and TLS both point at the counting server; TLS fails the
        // handshake but still opens a connection.
        let (port, hits) = counting_server(Duration::ZERO).await;
        let checker = checker(port, port, 90);
        let identity = HostIdentity::new(CandidateHost::new("127.0.0.1"), "*.example.com");

        let findings = checker.check(&identity).await.expect("plain variant answers");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(findings.keys().collect::<Vec<_>>(), vec!["http://"]);
        assert_eq!(findings.0.get("http://").unwrap().request, format!("http://127.0.0.1:{port}"));
    }

    #[tokio::test]
    async fn empty_common_name_routes_through_ip_only_path() {
        let (port, hits) = counting_server(Duration::ZERO).await;
        let checker = checker(port, port, 90);
        let identity = HostIdentity::anonymous(CandidateHost::new("127.0.0.1"));

        let findings = checker.check(&identity).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(findings.0.get("http://").unwrap().domain, "");
    }

    #[tokio::test]
    async fn valid_domain_keys_records_by_addressing_mode() {
        // The domain never resolves, so only the by-IP plain probe answers.
        let (port, _) = counting_server(Duration::ZERO).await;
        let checker = checker(port, port, 90);
        let identity = HostIdentity::new(CandidateHost::new("127.0.0.1"), "shop.example.invalid");

        let findings = checker.check(&identity).await.unwrap();
        assert_eq!(findings.keys().collect::<Vec<_>>(), vec!["http://_ip"]);
        let record = findings.0.get("http://_ip").unwrap();
        assert_eq!(record.domain, "shop.example.invalid");
        assert_eq!(record.title, "ok");
    }

    #[tokio::test]
    async fn host_with_no_answers_is_absent() {
        let port = closed_port().await;
        let checker = checker(port, port, 90);
        let identity = HostIdentity::anonymous(CandidateHost::new("127.0.0.1"));
        assert!(checker.check(&identity).await.is_none());
    }

    #[tokio::test]
    async fn limiter_bounds_hosts_in_flight() {
        let (port, hits) = counting_server(Duration::from_millis(200)).await;
        let closed = closed_port().await;
        // TLS probes hit a closed port, so each host holds one slow connection.
        let checker = checker(port, closed, 3);
        let identities: Vec<_> = (0..9).map(|_| HostIdentity::anonymous(CandidateHost::new("127.0.0.1"))).collect();

        let started = Instant::now();
        let results = join_all(identities.iter().map(|id| checker.check(id))).await;

        // Nine hosts, three at a time, 200ms each: at least three rounds.
        assert!(started.elapsed() >= Duration::from_millis(550));
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 9);
        assert_eq!(hits.load(Ordering::SeqCst), 9);
        assert_eq!(checker.limiter.available_permits(), 3);
    }

    #[tokio::test]
    async fn valid_domain_attempts_all_four_variants() {
        let (http_port, plain_hits) = counting_server(Duration::ZERO).await;
        let (tls_port, handshakes) = tls_server("<title>secure</title>");
        let config = Arc::new(test_config(http_port, tls_port));
        let http = HttpScanner::resolving_to_loopback(config.clone(), CERT_COMMON_NAME).unwrap();
        let checker = SiteChecker::new(http, &config.protocols, 90);
        let identity = HostIdentity::new(CandidateHost::new("127.0.0.1"), CERT_COMMON_NAME);

        let findings = checker.check(&identity).await.expect("every variant answers");

        assert_eq!(plain_hits.load(Ordering::SeqCst), 2);
        assert_eq!(handshakes.load(Ordering::SeqCst), 2);
        assert_eq!(
            findings.keys().collect::<Vec<_>>(),
            vec!["http://_domain", "http://_ip", "https://_domain", "https://_ip"]
        );
        assert_eq!(findings.0.get("http://_domain").unwrap().request, format!("http://{CERT_COMMON_NAME}:{http_port}"));
        assert_eq!(findings.0.get("https://_ip").unwrap().request, format!("https://127.0.0.1:{tls_port}"));
        assert_eq!(findings.0.get("https://_domain").unwrap().title, "secure");
        assert_eq!(findings.0.get("http://_ip").unwrap().title, "ok");
    }

    #[tokio::test]
    async fn connection_cap_bounds_open_requests() {
        let (port, peak) = peak_tracking_server(Duration::from_millis(150)).await;
        let closed = closed_port().await;
        let checker = checker_with(ScannerConfig {
            max_concurrent: 2,
            host_check_limit: 90,
            ..test_config(port, closed)
        });
        let identities: Vec<_> = (0..8).map(|_| HostIdentity::anonymous(CandidateHost::new("127.0.0.1"))).collect();

        let started = Instant::now();
        let results = join_all(identities.iter().map(|id| checker.check(id))).await;

        // All eight hosts pass the limiter at once; the cap alone serializes
        // their plain requests into four rounds.
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 8);
        assert!((1..=2).contains(&peak.load(Ordering::SeqCst)));
        assert!(started.elapsed() >= Duration::from_millis(550));
    }
}
