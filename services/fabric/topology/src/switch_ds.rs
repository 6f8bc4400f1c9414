//! Topology store: per-switch port and link state.

use crate::port::Port;
use std::collections::BTreeMap;

/// Ports of one switch keyed by port number
pub type SwitchPorts = BTreeMap<u16, Port>;

/// Single source of truth for port/link state, queried synchronously by the router
///
/// Lookups on unknown switches or ports answer "not found" and mutations on
/// them are no-ops, so topology churn never fails the control loop. Switches
/// are created implicitly by their first port and never removed.
#[derive(Debug, Default, Clone)]
pub struct SwitchDs {
    /// dpid -> ports; ordered so iteration and flooding are deterministic
    switches: BTreeMap<u64, SwitchPorts>,
}

// Include implementation
mod database;
pub use database::{Iter, TopologyStats};
