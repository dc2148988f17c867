//! nf-monitor: health and metrics monitoring layer of a network-function
//! lifecycle manager.
//!
//! The embedding daemon attaches packet-processing programs (TC
//! ingress/egress and XDP) to network interfaces. This crate watches those
//! programs and reports lifecycle and usage metrics:
//!
//! - [`registry::ProgramRegistry`] — one per traffic direction, mapping an
//!   interface to its ordered program chain. Mutated by the attach/detach
//!   and admin paths, read by the scanners.
//! - [`monitor::Scanner`] — one background task per direction; every second
//!   it walks a registry snapshot and runs each eligible program's
//!   [`program::UsageCollector`].
//! - [`metrics::MetricsSink`] — the four metric families collectors and the
//!   lifecycle paths record into.
//! - [`metrics::exporter::MetricsExporter`] — `GET /metrics` in the
//!   Prometheus text exposition format.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use error::ResultLogExt;

pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod program;
pub mod registry;

/// Runs the monitoring layer standalone.
///
/// Resolves [`config::Settings`] from the environment, starts the metrics
/// endpoint and one scanner per direction over empty registries, and waits
/// for Ctrl-C. On signal all tasks are cancelled and joined.
///
/// # Errors
///
/// Possible errors include:
/// - Failure to resolve the host label (no override configured and the
///   hostname files are unreadable).
/// - Failure to bind the metrics endpoint, which is the daemon's only
///   external health signal and therefore aborts startup.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::Settings::from_env();
    let hostname = settings.hostname()?;
    log::debug!("Hostname: {}", &hostname);

    let sink = Arc::new(metrics::MetricsSink::new(&hostname, &settings.daemon_name));
    let shutdown = CancellationToken::new();

    let exporter = metrics::exporter::MetricsExporter::new(Arc::clone(&sink));
    let exporter_handle = exporter
        .serve(&settings.metrics_addr, shutdown.clone())
        .await?;

    let mut handles = vec![exporter_handle];

    for direction in program::Direction::ALL {
        let registry = Arc::new(registry::ProgramRegistry::new());
        let scanner = monitor::Scanner::new(
            settings.chain_mode,
            settings.interval_secs(direction),
            direction,
            registry,
            shutdown.clone(),
        );
        handles.push(scanner.start());
    }

    tokio::signal::ctrl_c().await?;
    log::debug!("Shutdown signal received");
    shutdown.cancel();
    for handle in handles {
        handle.await.ok_or_log("monitoring task failed to join");
    }

    Ok(())
}
