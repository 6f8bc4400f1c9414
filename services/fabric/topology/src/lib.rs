//! Switch/port/link topology store and forwarding-eligibility queries for fabric.
//!
//! The store owns one [`Port`] record per `(dpid, port_no)`. Links between
//! switches have no record of their own; their state lives in the two port
//! records they connect, filled in by port-status and link-status
//! notifications from the topology discovery service.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod port;
pub mod switch_ds;

pub use port::{LinkDirection, Port, PortKey};
pub use switch_ds::{Iter, SwitchDs, SwitchPorts, TopologyStats};
