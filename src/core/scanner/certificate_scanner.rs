// src/core/scanner/certificate_scanner.rs

use tracing::{debug, error, trace};

use crate::core::errors::CertificateProbeError;
use crate::core::models::{CandidateHost, HostIdentity};
use futures::future::join_all;
use native_tls::TlsConnector;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use x509_parser::prelude::*;

/// Fetches the certificate common name of `host:port`.
///
/// The handshake runs on the blocking pool. Every failure collapses into an
/// identity with an empty common name; the reason is only logged.
pub async fn fetch_identity(host: CandidateHost, port: u16, timeout: Duration) -> HostIdentity {
    let target = host.as_str().to_owned();
    let outcome = spawn_blocking(move || read_common_name(&target, port, timeout))
        .await
        .unwrap_or_else(|e| {
            error!(panic = %e, "Certificate worker task failed.");
            Err(CertificateProbeError::Worker(e.to_string()))
        });

    match outcome {
        Ok(common_name) => {
            debug!(host = %host, common_name = %common_name, "Certificate fetched.");
            HostIdentity::new(host, common_name)
        }
        Err(reason) => {
            debug!(host = %host, reason = %reason, "Certificate fetch failed.");
            HostIdentity::anonymous(host)
        }
    }
}

/// Runs [`fetch_identity`] for every host at once and waits for all of them.
/// Output order follows input order.
pub async fn fetch_identities(hosts: &[CandidateHost], port: u16, timeout: Duration) -> Vec<HostIdentity> {
    join_all(hosts.iter().cloned().map(|host| fetch_identity(host, port, timeout))).await
}

fn read_common_name(target: &str, port: u16, timeout: Duration) -> Result<String, CertificateProbeError> {
    // Identity is harvested, not verified.
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .use_sni(false)
        .build()?;

    let addr = resolve(target, port)?;
    trace!(%addr, "Connecting TCP stream.");
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let stream = connector
        .connect(target, stream)
        .map_err(|e| CertificateProbeError::Handshake(e.to_string()))?;

    let cert = stream
        .peer_certificate()
        .map_err(|e| CertificateProbeError::Handshake(e.to_string()))?
        .ok_or(CertificateProbeError::NoCertificate)?;
    let der = cert.to_der().map_err(|e| CertificateProbeError::Parse(e.to_string()))?;

    common_name_from_der(&der)
}

fn resolve(target: &str, port: u16) -> Result<SocketAddr, CertificateProbeError> {
    (target, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved").into()
    })
}

/// Extracts the first subject common name from a DER certificate.
pub fn common_name_from_der(der: &[u8]) -> Result<String, CertificateProbeError> {
    let (_, x509) = parse_x509_certificate(der).map_err(|e| CertificateProbeError::Parse(e.to_string()))?;
    let common_name = x509
        .subject()
        .iter_common_name()
        .next()
        .ok_or(CertificateProbeError::NoCommonName)?;
    common_name
        .as_str()
        .map(str::to_owned)
        .map_err(|e| CertificateProbeError::Parse(e.to_string()))
}
