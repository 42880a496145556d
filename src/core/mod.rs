// src/core/mod.rs

/// Immutable scan settings and their defaults.
pub mod config;

/// Error taxonomy: fatal discovery and configuration errors, plus the probe
/// failure reasons that are only ever logged.
pub mod errors;

/// Candidate hosts, identities, probe variants and the records published to
/// the sink.
pub mod models;

/// Discovery input handling, including the optional masscan run.
pub mod discovery;

/// Delivery of completed chunks to the ingestion sink.
pub mod publisher;

/// The scanning engine: certificate fetch, HTTP probing, per-host policy and
/// chunk orchestration.
pub mod scanner;
