/// Entry point for the nf-monitor daemon.
///
/// This binary starts the monitoring layer standalone: the metrics endpoint
/// and one scanner per traffic direction, over initially empty program
/// registries. Programs are attached by the embedding lifecycle manager; on
/// its own the binary serves real but empty metrics.
///
/// # Errors
///
/// Returns an error if initialization fails (e.g., the hostname cannot be
/// resolved or the metrics endpoint cannot bind).
///
/// # Examples
///
/// ```bash
/// NF_MONITOR_METRICS_ADDR=127.0.0.1:8898 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    nf_monitor::run().await
}
