//! Periodic scan loop over one direction's program registry.
//!
//! One [`Scanner`] runs per traffic direction. Every second it takes a
//! snapshot of its registry and triggers usage collection for every eligible
//! program. Eligibility excludes administratively disabled programs and, in
//! chained deployments, the root program of each chain. A failing collector
//! is logged and never stops the rest of the pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::program::{AdminStatus, Direction};
use crate::registry::ProgramRegistry;

/// Fixed scan cadence. Independent of the configured collection interval,
/// which is only forwarded to the collectors.
const SCAN_TICK: Duration = Duration::from_secs(1);

/// Background scanner for one traffic direction.
pub struct Scanner {
    chain_mode: bool,
    interval_secs: u64,
    direction: Direction,
    registry: Arc<ProgramRegistry>,
    shutdown: CancellationToken,
}

impl Scanner {
    pub fn new(
        chain_mode: bool,
        interval_secs: u64,
        direction: Direction,
        registry: Arc<ProgramRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            chain_mode,
            interval_secs,
            direction,
            registry,
            shutdown,
        }
    }

    /// Spawns the scan task and returns its handle.
    ///
    /// The task runs until `shutdown` is cancelled; without cancellation it
    /// runs for the lifetime of the process.
    pub fn start(self) -> JoinHandle<()> {
        let scanner = Arc::new(self);
        tokio::spawn(scanner.run())
    }

    async fn run(self: Arc<Self>) {
        log::debug!(
            "Started {} scanner (chain_mode={}, interval={}s)",
            self.direction,
            self.chain_mode,
            self.interval_secs
        );
        let mut ticker = tokio::time::interval(SCAN_TICK);
        // A pass that overruns a tick delays the next pass; missed ticks are
        // dropped, not queued.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let scanner = Arc::clone(&self);
                    if let Err(err) = tokio::task::spawn_blocking(move || scanner.scan_once()).await {
                        log::error!("{} scan pass panicked: {}", self.direction, err);
                    }
                }
            }
        }
        log::debug!("Stopped {} scanner", self.direction);
    }

    /// One pass over a registry snapshot.
    fn scan_once(&self) {
        let snapshot = self.registry.snapshot();
        log::trace!("Scanning {} interfaces ({})", snapshot.len(), self.direction);
        let before = std::time::Instant::now();
        for (iface, chain) in snapshot {
            if chain.is_empty() {
                continue;
            }
            for entry in &chain {
                if self.chain_mode && entry.is_root() {
                    continue;
                }
                if entry.admin_status() == AdminStatus::Disabled {
                    continue;
                }
                if let Err(err) = entry.collect(&iface, self.interval_secs) {
                    log::error!(
                        "usage collection failed for program `{}` on `{iface}` ({}): {err}",
                        entry.name(),
                        self.direction
                    );
                }
            }
        }
        log::trace!("scan pass took {} microseconds", before.elapsed().as_micros());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{CollectionError, ProgramEntry, UsageCollector};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingCollector {
        calls: Mutex<Vec<(String, u64)>>,
    }

    impl RecordingCollector {
        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl UsageCollector for RecordingCollector {
        fn collect(&self, iface: &str, interval_secs: u64) -> Result<(), CollectionError> {
            self.calls.lock().unwrap().push((iface.to_owned(), interval_secs));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingCollector {
        attempts: AtomicUsize,
    }

    impl UsageCollector for FailingCollector {
        fn collect(&self, _iface: &str, _interval_secs: u64) -> Result<(), CollectionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(CollectionError::new("map read failed"))
        }
    }

    #[derive(Default)]
    struct PanickingCollector {
        attempts: AtomicUsize,
    }

    impl UsageCollector for PanickingCollector {
        fn collect(&self, _iface: &str, _interval_secs: u64) -> Result<(), CollectionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            panic!("collector blew up");
        }
    }

    /// Sleeps through `initial_delay` on the first call, returns immediately
    /// afterwards, and records whether any two calls ever ran concurrently.
    struct SlowCollector {
        initial_delay: Duration,
        in_flight: AtomicUsize,
        started: AtomicUsize,
        overlapped: AtomicBool,
    }

    impl SlowCollector {
        fn with_initial_delay(initial_delay: Duration) -> Self {
            Self {
                initial_delay,
                in_flight: AtomicUsize::new(0),
                started: AtomicUsize::new(0),
                overlapped: AtomicBool::new(false),
            }
        }
    }

    impl UsageCollector for SlowCollector {
        fn collect(&self, _iface: &str, _interval_secs: u64) -> Result<(), CollectionError> {
            let index = self.started.fetch_add(1, Ordering::SeqCst);
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            if index == 0 {
                std::thread::sleep(self.initial_delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn entry(
        name: &str,
        seq_position: u32,
        admin_status: AdminStatus,
        collector: Arc<dyn UsageCollector>,
    ) -> ProgramEntry {
        ProgramEntry::new(name, seq_position, admin_status, collector)
    }

    fn scanner(chain_mode: bool, registry: Arc<ProgramRegistry>) -> Scanner {
        Scanner::new(
            chain_mode,
            30,
            Direction::Ingress,
            registry,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_disabled_programs_are_never_collected() {
        let registry = Arc::new(ProgramRegistry::new());
        let collector = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("firewall", 1, AdminStatus::Disabled, Arc::clone(&collector) as _),
        );

        scanner(false, Arc::clone(&registry)).scan_once();
        scanner(true, registry).scan_once();

        assert_eq!(collector.count(), 0);
    }

    #[test]
    fn test_chain_mode_skips_root_program() {
        let registry = Arc::new(ProgramRegistry::new());
        let root = Arc::new(RecordingCollector::default());
        let child = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("dispatcher", 0, AdminStatus::Enabled, Arc::clone(&root) as _),
        );
        registry.attach(
            "eth0",
            entry("firewall", 1, AdminStatus::Enabled, Arc::clone(&child) as _),
        );

        scanner(true, registry).scan_once();

        assert_eq!(root.count(), 0);
        assert_eq!(child.count(), 1);
    }

    #[test]
    fn test_unchained_mode_collects_root_program() {
        let registry = Arc::new(ProgramRegistry::new());
        let root = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("standalone", 0, AdminStatus::Enabled, Arc::clone(&root) as _),
        );

        scanner(false, registry).scan_once();

        assert_eq!(root.count(), 1);
    }

    #[test]
    fn test_failing_program_does_not_stop_the_pass() {
        let registry = Arc::new(ProgramRegistry::new());
        let failing = Arc::new(FailingCollector::default());
        let healthy = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("broken", 1, AdminStatus::Enabled, Arc::clone(&failing) as _),
        );
        registry.attach(
            "eth0",
            entry("firewall", 2, AdminStatus::Enabled, Arc::clone(&healthy) as _),
        );

        let scanner = scanner(false, registry);
        scanner.scan_once();
        scanner.scan_once();

        assert_eq!(failing.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(healthy.count(), 2);
    }

    #[test]
    fn test_root_skip_keys_on_position_not_index() {
        let registry = Arc::new(ProgramRegistry::new());
        let child = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("dispatcher", 0, AdminStatus::Enabled, Arc::new(RecordingCollector::default())),
        );
        registry.attach(
            "eth0",
            entry("firewall", 1, AdminStatus::Enabled, Arc::clone(&child) as _),
        );
        registry.detach("eth0", "dispatcher");

        // `firewall` now sits at index 0 but keeps sequence position 1.
        scanner(true, registry).scan_once();

        assert_eq!(child.count(), 1);
    }

    #[test]
    fn test_emptied_chain_is_skipped() {
        let registry = Arc::new(ProgramRegistry::new());
        let collector = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("firewall", 1, AdminStatus::Enabled, Arc::clone(&collector) as _),
        );
        registry.detach("eth0", "firewall");

        scanner(false, registry).scan_once();

        assert_eq!(collector.count(), 0);
    }

    #[test]
    fn test_collector_receives_interface_and_interval() {
        let registry = Arc::new(ProgramRegistry::new());
        let collector = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth3",
            entry("firewall", 1, AdminStatus::Enabled, Arc::clone(&collector) as _),
        );

        Scanner::new(
            false,
            45,
            Direction::Egress,
            registry,
            CancellationToken::new(),
        )
        .scan_once();

        assert_eq!(
            *collector.calls.lock().unwrap(),
            [("eth3".to_owned(), 45)]
        );
    }

    #[test]
    fn test_admin_flip_takes_effect_next_pass() {
        let registry = Arc::new(ProgramRegistry::new());
        let collector = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("firewall", 1, AdminStatus::Enabled, Arc::clone(&collector) as _),
        );

        let scanner = scanner(false, Arc::clone(&registry));
        scanner.scan_once();
        registry.set_admin_status("eth0", "firewall", AdminStatus::Disabled);
        scanner.scan_once();

        assert_eq!(collector.count(), 1);
    }

    #[tokio::test]
    async fn test_scanner_ticks_and_stops_on_cancellation() {
        let registry = Arc::new(ProgramRegistry::new());
        let collector = Arc::new(RecordingCollector::default());
        registry.attach(
            "eth0",
            entry("firewall", 1, AdminStatus::Enabled, Arc::clone(&collector) as _),
        );

        let shutdown = CancellationToken::new();
        let handle = Scanner::new(
            false,
            30,
            Direction::Ingress,
            registry,
            shutdown.clone(),
        )
        .start();

        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(collector.count() >= 1);

        shutdown.cancel();
        handle.await.expect("scanner task must shut down cleanly");

        let after_shutdown = collector.count();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(collector.count(), after_shutdown);
    }

    #[tokio::test]
    async fn test_panicking_collector_aborts_only_its_pass() {
        let registry = Arc::new(ProgramRegistry::new());
        let collector = Arc::new(PanickingCollector::default());
        registry.attach(
            "eth0",
            entry("broken", 1, AdminStatus::Enabled, Arc::clone(&collector) as _),
        );

        let shutdown = CancellationToken::new();
        let handle = Scanner::new(
            false,
            30,
            Direction::Ingress,
            registry,
            shutdown.clone(),
        )
        .start();

        // A second attempt means the scanner outlived the first panicking pass.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while collector.attempts.load(Ordering::SeqCst) < 2 {
            assert!(std::time::Instant::now() < deadline, "scanner stopped ticking");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        shutdown.cancel();
        handle.await.expect("scanner task must shut down cleanly");
    }

    #[tokio::test]
    async fn test_slow_pass_defers_ticks_without_overlap() {
        let registry = Arc::new(ProgramRegistry::new());
        let collector =
            Arc::new(SlowCollector::with_initial_delay(Duration::from_millis(2200)));
        registry.attach(
            "eth0",
            entry("slow", 1, AdminStatus::Enabled, Arc::clone(&collector) as _),
        );

        let shutdown = CancellationToken::new();
        let handle = Scanner::new(
            false,
            30,
            Direction::Ingress,
            registry,
            shutdown.clone(),
        )
        .start();

        // The first pass runs from t=0s to t=2.2s and holds back the t=1s
        // and t=2s ticks. That backlog collapses into a single late tick at
        // t=2.2s, after which the ticker waits for the t=3s boundary. A
        // ticker that queued the backlog would start a third pass right
        // after the late one.
        tokio::time::sleep(Duration::from_millis(2600)).await;
        shutdown.cancel();
        handle.await.expect("scanner task must shut down cleanly");

        assert!(!collector.overlapped.load(Ordering::SeqCst));
        assert_eq!(collector.started.load(Ordering::SeqCst), 2);
    }
}
