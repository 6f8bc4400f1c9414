//! Per-(switch, port) state record and its forwarding classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified port: `(dpid, port_no)`
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortKey {
    /// Datapath id
    pub dpid: u64,
    /// Port number on that datapath
    pub port_no: u16,
}

impl PortKey {
    /// Create a port key
    pub fn new(dpid: u64, port_no: u16) -> Self {
        Self { dpid, port_no }
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{}", self.dpid, self.port_no)
    }
}

impl From<(u64, u16)> for PortKey {
    fn from((dpid, port_no): (u64, u16)) -> Self {
        Self { dpid, port_no }
    }
}

/// Which half of a switch-to-switch link an update refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkDirection {
    /// Our side reports the link up
    Forward,
    /// The peer reports the same link up
    Reverse,
}

impl From<u8> for LinkDirection {
    /// 0 selects the forward link, anything else the reverse link
    fn from(which: u8) -> Self {
        if which == 0 {
            LinkDirection::Forward
        } else {
            LinkDirection::Reverse
        }
    }
}

/// One physical port on one switch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port number, stable for the port's lifetime
    pub port_no: u16,
    /// Port faces a host or external network
    pub external_link: bool,
    /// Link to another switch is up, as reported for this port
    pub switch_to_switch_link: bool,
    /// Same link is up, as reported by the peer
    pub switch_to_switch_link_reverse: bool,
    /// Far end of the link, once discovery has reported it
    pub peer: Option<PortKey>,
}

impl Port {
    /// Fresh port with no link state
    pub fn new(port_no: u16, external_link: bool) -> Self {
        Self {
            port_no,
            external_link,
            switch_to_switch_link: false,
            switch_to_switch_link_reverse: false,
            peer: None,
        }
    }

    /// Internal port whose link is confirmed in both directions
    pub fn is_forwarding_port(&self) -> bool {
        !self.external_link && self.switch_to_switch_link && self.switch_to_switch_link_reverse
    }

    /// Port eligible to receive flooded packets
    ///
    /// Everything except internal ports whose peer confirmed the link, so a
    /// flood never re-enters the switch fabric over a confirmed uplink.
    pub fn is_action_port(&self) -> bool {
        !(!self.external_link && self.switch_to_switch_link_reverse)
    }

    /// Set one half of the link state
    pub(crate) fn set_link(&mut self, which: LinkDirection, up: bool) {
        match which {
            LinkDirection::Forward => self.switch_to_switch_link = up,
            LinkDirection::Reverse => self.switch_to_switch_link_reverse = up,
        }
    }
}
