//! Metric families recorded by the monitoring layer.
//!
//! [`MetricsSink`] owns a private [`prometheus::Registry`] holding four
//! families, all namespaced with the daemon name and carrying a `host` label
//! fixed at initialization:
//!
//! - `NFStartCount` / `NFStopCount` — counters of network function starts
//!   and stops
//! - `NFRunning` — gauge, whether a network function is currently running
//! - `NFStartTime` — gauge, start time in seconds since the unix epoch
//!
//! Every series varies over the `network_function` and `direction` labels.
//! Writes go through [`MetricsSink::increment`] and
//! [`MetricsSink::set_value`]; a family that failed to register degrades
//! those into logged no-ops instead of failing the caller.

pub mod exporter;

use std::fmt;

use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};

use crate::error::ResultLogExt;
use crate::program::Direction;

/// Labels every series varies over. The `host` label is constant per sink.
const SERIES_LABELS: [&str; 2] = ["network_function", "direction"];

/// Counter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterFamily {
    /// Count of network functions started.
    StartCount,
    /// Count of network functions stopped.
    StopCount,
}

impl CounterFamily {
    fn name(self) -> &'static str {
        match self {
            CounterFamily::StartCount => "NFStartCount",
            CounterFamily::StopCount => "NFStopCount",
        }
    }

    fn help(self) -> &'static str {
        match self {
            CounterFamily::StartCount => "The count of network functions started",
            CounterFamily::StopCount => "The count of network functions stopped",
        }
    }
}

impl fmt::Display for CounterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Gauge families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeFamily {
    /// Whether a network function is currently running.
    Running,
    /// Start time of a network function, seconds since the unix epoch.
    StartTime,
}

impl GaugeFamily {
    fn name(self) -> &'static str {
        match self {
            GaugeFamily::Running => "NFRunning",
            GaugeFamily::StartTime => "NFStartTime",
        }
    }

    fn help(self) -> &'static str {
        match self {
            GaugeFamily::Running => "This value indicates network functions is running or not",
            GaugeFamily::StartTime => {
                "This value indicates start time of the network function since unix epoch in seconds"
            }
        }
    }
}

impl fmt::Display for GaugeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-wide set of metric families.
///
/// Created once at startup and shared behind an `Arc` with every component
/// that records or exposes values. All write paths are atomic; concurrent
/// increments accumulate exactly and concurrent gauge writes resolve to the
/// last value written.
pub struct MetricsSink {
    registry: Registry,
    start_count: Option<IntCounterVec>,
    stop_count: Option<IntCounterVec>,
    running: Option<GaugeVec>,
    start_time: Option<GaugeVec>,
}

impl MetricsSink {
    /// Creates the sink and registers all four families, namespaced with
    /// `daemon_name` and carrying `hostname` as the `host` label on every
    /// series.
    ///
    /// A family that cannot be built or registered is logged at warn level
    /// and left uninitialized; writes to it are dropped.
    pub fn new(hostname: &str, daemon_name: &str) -> Self {
        let registry = Registry::new();
        Self {
            start_count: register_counter(
                &registry,
                CounterFamily::StartCount,
                hostname,
                daemon_name,
            ),
            stop_count: register_counter(
                &registry,
                CounterFamily::StopCount,
                hostname,
                daemon_name,
            ),
            running: register_gauge(&registry, GaugeFamily::Running, hostname, daemon_name),
            start_time: register_gauge(&registry, GaugeFamily::StartTime, hostname, daemon_name),
            registry,
        }
    }

    /// Increments the `(nf, direction)` series of `family` by one.
    ///
    /// A write to an uninitialized family, or to a series whose labels fail
    /// to resolve, is logged at warn level and dropped.
    pub fn increment(&self, family: CounterFamily, nf: &str, direction: Direction) {
        let Some(counters) = self.counters(family) else {
            log::warn!("counter family {family} is not initialized, dropping increment");
            return;
        };
        match counters.get_metric_with_label_values(&[nf, direction.as_str()]) {
            Ok(counter) => counter.inc(),
            Err(err) => {
                log::warn!("dropping {family} increment for `{nf}` ({direction}): {err}");
            }
        }
    }

    /// Overwrites the `(nf, direction)` series of `family` with `value`.
    ///
    /// Same degraded modes as [`MetricsSink::increment`].
    pub fn set_value(&self, value: f64, family: GaugeFamily, nf: &str, direction: Direction) {
        let Some(gauges) = self.gauges(family) else {
            log::warn!("gauge family {family} is not initialized, dropping write");
            return;
        };
        match gauges.get_metric_with_label_values(&[nf, direction.as_str()]) {
            Ok(gauge) => gauge.set(value),
            Err(err) => {
                log::warn!("dropping {family} write for `{nf}` ({direction}): {err}");
            }
        }
    }

    /// Point-in-time view of every initialized family, for exposition.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    fn counters(&self, family: CounterFamily) -> Option<&IntCounterVec> {
        match family {
            CounterFamily::StartCount => self.start_count.as_ref(),
            CounterFamily::StopCount => self.stop_count.as_ref(),
        }
    }

    fn gauges(&self, family: GaugeFamily) -> Option<&GaugeVec> {
        match family {
            GaugeFamily::Running => self.running.as_ref(),
            GaugeFamily::StartTime => self.start_time.as_ref(),
        }
    }
}

fn family_opts(name: &str, help: &str, hostname: &str, daemon_name: &str) -> Opts {
    Opts::new(name, help)
        .namespace(daemon_name)
        .const_label("host", hostname)
}

fn register_counter(
    registry: &Registry,
    family: CounterFamily,
    hostname: &str,
    daemon_name: &str,
) -> Option<IntCounterVec> {
    let opts = family_opts(family.name(), family.help(), hostname, daemon_name);
    IntCounterVec::new(opts, &SERIES_LABELS)
        .and_then(|counters| {
            registry
                .register(Box::new(counters.clone()))
                .map(|_| counters)
        })
        .ok_or_warn(&format!("failed to register counter family {family}"))
}

fn register_gauge(
    registry: &Registry,
    family: GaugeFamily,
    hostname: &str,
    daemon_name: &str,
) -> Option<GaugeVec> {
    let opts = family_opts(family.name(), family.help(), hostname, daemon_name);
    GaugeVec::new(opts, &SERIES_LABELS)
        .and_then(|gauges| {
            registry
                .register(Box::new(gauges.clone()))
                .map(|_| gauges)
        })
        .ok_or_warn(&format!("failed to register gauge family {family}"))
}
