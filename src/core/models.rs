// src/core/models.rs

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumIter, EnumString};

// --- Candidate Hosts ---

/// An IPv4 literal extracted from the discovery output.
///
/// No validation beyond the dotted-quad shape is applied, so values such as
/// `999.1.1.1` survive extraction and simply fail to connect later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CandidateHost(String);

impl CandidateHost {
    pub fn new(ip: impl Into<String>) -> Self {
        Self(ip.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A host paired with the subject common name of its TLS certificate.
/// `common_name` is empty when no certificate could be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub host: CandidateHost,
    pub common_name: String,
}

impl HostIdentity {
    pub fn new(host: CandidateHost, common_name: impl Into<String>) -> Self {
        Self { host, common_name: common_name.into() }
    }

    /// Identity for a host whose certificate could not be fetched.
    pub fn anonymous(host: CandidateHost) -> Self {
        Self { host, common_name: String::new() }
    }
}

// --- Probe Variants ---

/// URL scheme of a probe. The string forms double as the prefixes of the
/// variant keys published to the sink.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
pub enum Protocol {
    #[strum(to_string = "http://", serialize = "http")]
    Plain,
    #[strum(to_string = "https://", serialize = "https")]
    Secure,
}

/// Whether a probe addresses the host by its raw IP or by its certificate name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum AddressingMode {
    #[strum(serialize = "_domain")]
    ByDomain,
    #[strum(serialize = "_ip")]
    ByIp,
}

/// One (protocol, addressing mode) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeVariant {
    pub protocol: Protocol,
    pub mode: AddressingMode,
}

/// The probing policy chosen for a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePlan {
    /// Wildcard, empty or malformed common name: every protocol, by IP only.
    IpOnly,
    /// Usable domain: every protocol, by domain and by IP.
    Full,
}

impl ProbePlan {
    /// Expands the plan into concrete variants, protocol by protocol, in the
    /// order they are published.
    pub fn variants(self, protocols: &[Protocol]) -> Vec<ProbeVariant> {
        let modes: &[AddressingMode] = match self {
            ProbePlan::IpOnly => &[AddressingMode::ByIp],
            ProbePlan::Full => &[AddressingMode::ByDomain, AddressingMode::ByIp],
        };
        protocols
            .iter()
            .flat_map(|&protocol| modes.iter().map(move |&mode| ProbeVariant { protocol, mode }))
            .collect()
    }

    /// Key under which a variant's record is published.
    ///
    /// The IP-only plan keys records by bare scheme (`"https://"`); the full
    /// plan adds the addressing suffix (`"https://_domain"`).
    pub fn key(self, variant: &ProbeVariant) -> String {
        match self {
            ProbePlan::IpOnly => variant.protocol.to_string(),
            ProbePlan::Full => format!("{}{}", variant.protocol, variant.mode),
        }
    }
}

// --- Probe Results ---

/// Outcome of one successful HTTP probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeRecord {
    pub title: String,
    /// The exact URL requested, before redirects.
    pub request: String,
    pub ip: String,
    pub domain: String,
    /// At most [`RESPONSE_PREFIX_CHARS`] characters of the body.
    pub response_text: String,
}

pub const RESPONSE_PREFIX_CHARS: usize = 300;

/// Successful probes of one host, keyed by variant key.
/// Only ever constructed non-empty by the site checker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HostFindings(pub BTreeMap<String, ProbeRecord>);

impl HostFindings {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Per-host findings of one chunk, in candidate order, hosts without any
/// successful variant omitted.
pub type ChunkResult = Vec<HostFindings>;

/// Totals reported once every chunk has been processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub candidates: usize,
    pub chunks: usize,
    pub hosts_published: usize,
    pub failed_publishes: usize,
}
