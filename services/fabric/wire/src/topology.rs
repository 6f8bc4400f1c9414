//! Topology notifications delivered by the topology discovery service.

use serde::{Deserialize, Serialize};

/// Port operational state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    /// Port added or link came up
    Up,
    /// Port removed or went down
    Down,
}

/// Link state as seen by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Link confirmed up
    Up,
    /// Link down or unconfirmed
    Down,
}

impl LinkState {
    /// Whether the link is usable
    pub fn is_up(self) -> bool {
        matches!(self, LinkState::Up)
    }
}

impl From<bool> for LinkState {
    fn from(up: bool) -> Self {
        if up {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }
}

/// A port appeared, changed or disappeared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatus {
    /// Switch owning the port
    pub dpid: u64,
    /// Port number
    pub port_no: u16,
    /// New state
    pub status: PortState,
    /// Port faces a host or external network rather than another switch
    #[serde(default)]
    pub external: bool,
}

/// Discovery result for the link leaving `(from_dpid, from_port_no)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    /// Switch the link leaves
    pub from_dpid: u64,
    /// Port the link leaves
    pub from_port_no: u16,
    /// Peer switch, when discovery saw one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_dpid: Option<u64>,
    /// Peer port, when discovery saw one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port_no: Option<u16>,
    /// Link state
    pub status: LinkState,
}

impl PortStatus {
    /// Port came up
    pub fn up(dpid: u64, port_no: u16, external: bool) -> Self {
        Self {
            dpid,
            port_no,
            status: PortState::Up,
            external,
        }
    }

    /// Port went away
    pub fn down(dpid: u64, port_no: u16) -> Self {
        Self {
            dpid,
            port_no,
            status: PortState::Down,
            external: false,
        }
    }
}

impl LinkStatus {
    /// Link between two known ports
    pub fn between(from: (u64, u16), to: (u64, u16), status: LinkState) -> Self {
        Self {
            from_dpid: from.0,
            from_port_no: from.1,
            to_dpid: Some(to.0),
            to_port_no: Some(to.1),
            status,
        }
    }

    /// Link with no known peer
    pub fn dangling(from: (u64, u16), status: LinkState) -> Self {
        Self {
            from_dpid: from.0,
            from_port_no: from.1,
            to_dpid: None,
            to_port_no: None,
            status,
        }
    }

    /// Peer endpoint, if both halves are present
    pub fn peer(&self) -> Option<(u64, u16)> {
        match (self.to_dpid, self.to_port_no) {
            (Some(dpid), Some(port_no)) => Some((dpid, port_no)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_status_constructors() {
        let up = PortStatus::up(0x1, 3, true);
        assert_eq!(up.status, PortState::Up);
        assert!(up.external);

        let down = PortStatus::down(0x1, 3);
        assert_eq!(down.status, PortState::Down);
    }

    #[test]
    fn test_link_status_peer() {
        let link = LinkStatus::between((1, 2), (2, 1), LinkState::Up);
        assert_eq!(link.peer(), Some((2, 1)));
        assert!(link.status.is_up());

        let dangling = LinkStatus::dangling((1, 2), LinkState::Down);
        assert_eq!(dangling.peer(), None);

        let half = LinkStatus {
            to_port_no: None,
            ..link
        };
        assert_eq!(half.peer(), None);
    }

    #[test]
    fn test_link_state_from_bool() {
        assert_eq!(LinkState::from(true), LinkState::Up);
        assert_eq!(LinkState::from(false), LinkState::Down);
    }
}
