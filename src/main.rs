// src/main.rs

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{error, info, warn};

mod app;
mod core;
mod logging;

use app::Cli;
use crate::core::config::ScannerConfig;
use crate::core::discovery::DiscoveryFile;
use crate::core::errors::DiscoveryError;

/// Exit status after SIGINT/SIGTERM, as a shell reports it for SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

fn main() -> Result<()> {
    let cli = Cli::parse();
    color_eyre::install()?;
    let log_path = logging::initialize_logging()?;

    let config = Arc::new(cli.to_config().wrap_err("invalid configuration")?);
    info!(log = %log_path.display(), sink = %config.sink_url, "Starting certsweep.");

    // One scheduler thread for network I/O; handshakes go to the blocking pool.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(config.tls_workers)
        .build()
        .wrap_err("failed to build async runtime")?;

    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Arc<ScannerConfig>) -> Result<()> {
    // Registered before masscan starts so an early Ctrl-C still cleans up.
    let signals = ShutdownSignals::install().wrap_err("failed to install signal handlers")?;
    let (notify, shutdown) = watch::channel(false);
    tokio::spawn(forward_signals(signals, notify));

    let discovery = match cli.masscan_runner() {
        Some(runner) => match runner.run_until(signalled(shutdown.clone())).await {
            Err(DiscoveryError::Interrupted) => {
                warn!("Interrupted during discovery, nothing scanned.");
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
            other => other?,
        },
        None => cli.provided_input(),
    };

    let stop = Arc::new(AtomicBool::new(false));
    tokio::spawn(watch_signals(shutdown, discovery.clone(), stop.clone()));

    let outcome = crate::core::scanner::run_full_scan(config, discovery.path(), stop).await;
    discovery.remove();

    let summary = outcome.inspect_err(|e| error!(error = %e, "Scan aborted."))?;
    info!(
        candidates = summary.candidates,
        chunks = summary.chunks,
        hosts_published = summary.hosts_published,
        failed_publishes = summary.failed_publishes,
        "Done."
    );
    Ok(())
}

/// Publishes the first SIGINT/SIGTERM on `notify`; a second one exits at once.
async fn forward_signals(mut signals: ShutdownSignals, notify: watch::Sender<bool>) {
    signals.recv().await;
    warn!("Signal received, finishing current chunk. Send again to exit now.");
    notify.send_replace(true);

    signals.recv().await;
    error!("Second signal received, exiting.");
    std::process::exit(INTERRUPTED_EXIT_CODE);
}

/// Resolves once a shutdown has been requested.
async fn signalled(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Removes the transient discovery file on shutdown and asks the scan to
/// stop after the chunk in flight.
async fn watch_signals(shutdown: watch::Receiver<bool>, discovery: DiscoveryFile, stop: Arc<AtomicBool>) {
    signalled(shutdown).await;
    stop.store(true, Ordering::SeqCst);
    discovery.remove();
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        let _ = tokio::signal::ctrl_c().await;
    }
}
