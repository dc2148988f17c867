//! Data model for monitored network functions.
//!
//! A network function is a packet-processing program attached to a network
//! interface, either on a TC hook (ingress/egress) or on the XDP hook. The
//! lifecycle manager owns attachment and detachment; this crate only watches
//! the programs it is told about. [`ProgramEntry`] is the unit of watching:
//! identity, position in the interface's chain, administrative state and the
//! [`UsageCollector`] that knows how to read the program's usage data.

mod error;

use std::fmt;
use std::sync::Arc;

pub use error::CollectionError;

/// Traffic path a program is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ingress,
    Egress,
    XdpIngress,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Ingress, Direction::Egress, Direction::XdpIngress];

    /// Label value used on metric series for this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ingress => "ingress",
            Direction::Egress => "egress",
            Direction::XdpIngress => "xdpingress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrative state of a program.
///
/// Owned by the lifecycle manager; the monitoring layer reads it to decide
/// whether a program takes part in a scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminStatus {
    Enabled,
    Disabled,
}

/// Reads usage data out of a running program.
///
/// Implemented by the embedding daemon, typically by walking the program's
/// maps. Implementations must tolerate being called from a blocking worker
/// thread and may be shared between scan passes.
pub trait UsageCollector: Send + Sync {
    /// Collects the program's current usage on `iface`.
    ///
    /// `interval_secs` is the configured collection window for the program's
    /// direction; collectors that compute rates use it as the denominator.
    ///
    /// # Errors
    ///
    /// Returns a [`CollectionError`] when the usage data cannot be read. The
    /// scanner logs the failure and carries on with the rest of the chain.
    fn collect(&self, iface: &str, interval_secs: u64) -> Result<(), CollectionError>;
}

/// A single program attached to an interface.
///
/// Cloning is cheap; the name and collector are shared.
#[derive(Clone)]
pub struct ProgramEntry {
    name: Arc<str>,
    seq_position: u32,
    admin_status: AdminStatus,
    collector: Arc<dyn UsageCollector>,
}

impl ProgramEntry {
    pub fn new(
        name: impl AsRef<str>,
        seq_position: u32,
        admin_status: AdminStatus,
        collector: Arc<dyn UsageCollector>,
    ) -> Self {
        Self {
            name: name.as_ref().into(),
            seq_position,
            admin_status,
            collector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seq_position(&self) -> u32 {
        self.seq_position
    }

    /// Whether this entry is the root of a chain.
    ///
    /// In chained deployments the root program only dispatches to the rest of
    /// the chain and has no usage of its own.
    pub fn is_root(&self) -> bool {
        self.seq_position == 0
    }

    pub fn admin_status(&self) -> AdminStatus {
        self.admin_status
    }

    pub(crate) fn set_admin_status(&mut self, status: AdminStatus) {
        self.admin_status = status;
    }

    /// Runs this entry's collector.
    pub fn collect(&self, iface: &str, interval_secs: u64) -> Result<(), CollectionError> {
        self.collector.collect(iface, interval_secs)
    }
}

impl fmt::Debug for ProgramEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramEntry")
            .field("name", &self.name)
            .field("seq_position", &self.seq_position)
            .field("admin_status", &self.admin_status)
            .finish_non_exhaustive()
    }
}
