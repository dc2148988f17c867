//! Runtime settings, sourced from the environment.
//!
//! All variables are optional:
//!
//! - `NF_MONITOR_HOSTNAME` — overrides the `host` metric label; defaults to
//!   the machine hostname.
//! - `NF_MONITOR_DAEMON_NAME` — metric namespace, default `nf_monitor`.
//! - `NF_MONITOR_METRICS_ADDR` — exposition bind address, default
//!   `0.0.0.0:8898`.
//! - `NF_MONITOR_CHAIN_MODE` — whether programs are deployed as chains with
//!   a root dispatcher, default `false`.
//! - `NF_MONITOR_INGRESS_INTERVAL`, `NF_MONITOR_EGRESS_INTERVAL`,
//!   `NF_MONITOR_XDP_INGRESS_INTERVAL` — per-direction collection windows in
//!   seconds, default `30`.
//!
//! Unparseable values are logged at warn level and replaced by the default.

use std::io;

use crate::program::Direction;

const ENV_HOSTNAME: &str = "NF_MONITOR_HOSTNAME";
const ENV_DAEMON_NAME: &str = "NF_MONITOR_DAEMON_NAME";
const ENV_METRICS_ADDR: &str = "NF_MONITOR_METRICS_ADDR";
const ENV_CHAIN_MODE: &str = "NF_MONITOR_CHAIN_MODE";
const ENV_INGRESS_INTERVAL: &str = "NF_MONITOR_INGRESS_INTERVAL";
const ENV_EGRESS_INTERVAL: &str = "NF_MONITOR_EGRESS_INTERVAL";
const ENV_XDP_INGRESS_INTERVAL: &str = "NF_MONITOR_XDP_INGRESS_INTERVAL";

pub const DEFAULT_DAEMON_NAME: &str = "nf_monitor";
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8898";
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub hostname_override: Option<String>,
    pub daemon_name: String,
    pub metrics_addr: String,
    pub chain_mode: bool,
    pub ingress_interval_secs: u64,
    pub egress_interval_secs: u64,
    pub xdp_ingress_interval_secs: u64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            hostname_override: std::env::var(ENV_HOSTNAME).ok().filter(|v| !v.is_empty()),
            daemon_name: env_string(ENV_DAEMON_NAME, DEFAULT_DAEMON_NAME),
            metrics_addr: env_string(ENV_METRICS_ADDR, DEFAULT_METRICS_ADDR),
            chain_mode: env_flag(ENV_CHAIN_MODE, false),
            ingress_interval_secs: env_interval(ENV_INGRESS_INTERVAL),
            egress_interval_secs: env_interval(ENV_EGRESS_INTERVAL),
            xdp_ingress_interval_secs: env_interval(ENV_XDP_INGRESS_INTERVAL),
        }
    }

    /// Value for the `host` metric label: the configured override, or the
    /// machine hostname.
    ///
    /// # Errors
    ///
    /// Fails when no override is configured and the hostname files cannot be
    /// read.
    pub fn hostname(&self) -> io::Result<String> {
        match &self.hostname_override {
            Some(hostname) => Ok(hostname.clone()),
            None => machine_hostname(),
        }
    }

    /// Collection window forwarded to collectors of `direction`.
    pub fn interval_secs(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Ingress => self.ingress_interval_secs,
            Direction::Egress => self.egress_interval_secs,
            Direction::XdpIngress => self.xdp_ingress_interval_secs,
        }
    }
}

fn machine_hostname() -> io::Result<String> {
    let hostname = std::fs::read_to_string("/etc/hostname")
        .or_else(|_| std::fs::read_to_string("/proc/sys/kernel/hostname"))?;
    Ok(hostname.trim().to_owned())
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    flag_or_default(std::env::var(key).ok().as_deref(), key, default)
}

fn flag_or_default(raw: Option<&str>, key: &str, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    parse_flag(raw).unwrap_or_else(|| {
        log::warn!("invalid value `{raw}` for {key}, using {default}");
        default
    })
}

fn env_interval(key: &str) -> u64 {
    interval_or_default(std::env::var(key).ok().as_deref(), key)
}

fn interval_or_default(raw: Option<&str>, key: &str) -> u64 {
    let Some(raw) = raw else {
        return DEFAULT_INTERVAL_SECS;
    };
    parse_interval(raw).unwrap_or_else(|| {
        log::warn!("invalid interval `{raw}` for {key}, using {DEFAULT_INTERVAL_SECS}s");
        DEFAULT_INTERVAL_SECS
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Intervals are whole positive seconds; zero would make rate denominators
/// meaningless.
fn parse_interval(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}
