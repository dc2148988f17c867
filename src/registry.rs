//! Shared program registry, one per traffic direction.
//!
//! Maps an interface name to the ordered chain of programs attached to it.
//! The lifecycle manager mutates the registry as programs come and go; the
//! direction's scanner reads it once a second. Reads take a point-in-time
//! snapshot, so a scan pass never observes a chain mid-mutation.

use std::collections::HashMap;

use dashmap::DashMap;

use crate::program::{AdminStatus, ProgramEntry};

/// Interface name to program chain mapping for one direction.
///
/// Chain order is attachment order and defines scan traversal order. A chain
/// whose last program was detached stays registered with an empty chain;
/// scanners skip it.
#[derive(Debug, Default)]
pub struct ProgramRegistry {
    chains: DashMap<String, Vec<ProgramEntry>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` to the chain of `iface`, creating the chain if the
    /// interface is new.
    pub fn attach(&self, iface: &str, entry: ProgramEntry) {
        self.chains.entry(iface.to_owned()).or_default().push(entry);
    }

    /// Removes the program called `name` from the chain of `iface`.
    ///
    /// Returns the removed entry, or `None` when the interface or the program
    /// is unknown. The remaining entries keep their relative order.
    pub fn detach(&self, iface: &str, name: &str) -> Option<ProgramEntry> {
        let mut chain = self.chains.get_mut(iface)?;
        let position = chain.iter().position(|entry| entry.name() == name)?;
        Some(chain.remove(position))
    }

    /// Flips the administrative status of the program called `name` on
    /// `iface`. Returns `false` when the program is unknown.
    pub fn set_admin_status(&self, iface: &str, name: &str, status: AdminStatus) -> bool {
        let Some(mut chain) = self.chains.get_mut(iface) else {
            return false;
        };
        match chain.iter_mut().find(|entry| entry.name() == name) {
            Some(entry) => {
                entry.set_admin_status(status);
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of every chain.
    ///
    /// Mutations that happen after the snapshot was taken are not visible in
    /// it; the next snapshot picks them up.
    pub fn snapshot(&self) -> HashMap<String, Vec<ProgramEntry>> {
        self.chains
            .iter()
            .map(|chain| (chain.key().clone(), chain.value().clone()))
            .collect()
    }

    /// Number of interfaces with a registered (possibly empty) chain.
    pub fn interfaces(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
