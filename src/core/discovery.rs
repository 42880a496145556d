// src/core/discovery.rs

//! Discovery input: the optional masscan run and the output file it leaves.

use tracing::{info, warn};

use crate::core::errors::DiscoveryError;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Settings for a masscan run over an IP-range list.
#[derive(Debug, Clone)]
pub struct MasscanRunner {
    pub bin: String,
    pub ranges: PathBuf,
    pub output: PathBuf,
    pub port: u16,
    pub rate: u32,
}

impl MasscanRunner {
    pub fn args(&self) -> Vec<String> {
        vec![
            format!("-p{}", self.port),
            "--rate".to_string(),
            self.rate.to_string(),
            "--wait".to_string(),
            "0".to_string(),
            "-iL".to_string(),
            self.ranges.display().to_string(),
            "-oL".to_string(),
            self.output.display().to_string(),
        ]
    }

    /// Runs masscan until it exits or `interrupt` resolves, whichever comes
    /// first. On failure or interruption the child is stopped and the
    /// partial output is removed.
    pub async fn run_until(&self, interrupt: impl Future<Output = ()>) -> Result<DiscoveryFile, DiscoveryError> {
        if !self.ranges.exists() {
            return Err(DiscoveryError::InputMissing(self.ranges.clone()));
        }

        let args = self.args();
        info!(bin = %self.bin, args = %args.join(" "), "Running discovery.");
        let mut child = Command::new(&self.bin)
            .args(&args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DiscoveryError::ToolSpawn { bin: self.bin.clone(), source })?;

        let output = DiscoveryFile::transient(self.output.clone());
        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = interrupt => None,
        };

        let Some(status) = finished else {
            warn!(bin = %self.bin, "Discovery interrupted, stopping tool.");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to stop discovery tool.");
            }
            output.remove();
            return Err(DiscoveryError::Interrupted);
        };

        let status = status.map_err(DiscoveryError::ToolWait)?;
        if !status.success() {
            output.remove();
            return Err(DiscoveryError::ToolFailed { status });
        }
        Ok(output)
    }
}

/// A discovery output file. Transient files are deleted by [`DiscoveryFile::remove`].
#[derive(Debug, Clone)]
pub struct DiscoveryFile {
    path: PathBuf,
    transient: bool,
}

impl DiscoveryFile {
    /// A file supplied by the operator; never deleted.
    pub fn provided(path: PathBuf) -> Self {
        Self { path, transient: false }
    }

    pub fn transient(path: PathBuf) -> Self {
        Self { path, transient: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(&self) {
        if !self.transient || !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Removed discovery output."),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove discovery output."),
        }
    }
}

/// Reads the discovery output. A missing file is fatal.
pub async fn read_discovery_input(path: &Path) -> Result<String, DiscoveryError> {
    if !path.exists() {
        return Err(DiscoveryError::InputMissing(path.to_path_buf()));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DiscoveryError::Io { path: path.to_path_buf(), source })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
