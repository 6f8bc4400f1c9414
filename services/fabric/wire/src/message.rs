//! OpenFlow message objects exchanged with switches.
//!
//! These are value types with accessor contracts only. Binary framing of the
//! OpenFlow protocol lives outside this crate; the controller consumes and
//! produces these structures and a transport translates them.

use crate::mac::MacAddr;
use bitflags::bitflags;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Highest physical port number a switch may report
pub const OFPP_MAX: u16 = 0xff00;

/// "No port" marker used by packet-out when the packet has no ingress
pub const OFPP_NONE: u16 = 0xffff;

/// Largest miss-send length; asks switches for full packet bodies
pub const MAX_MISS_SEND_LEN: u16 = u16::MAX;

/// Default priority for installed flow entries
pub const DEFAULT_FLOW_PRIORITY: u16 = u16::MAX;

/// An action applied by a switch to a matching packet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Send the packet out of a port
    Output {
        /// Egress port number
        port: u16,
        /// Bytes sent to the controller when the port is the controller
        #[serde(default)]
        max_len: u16,
    },
    /// Rewrite the VLAN id
    SetVlanVid {
        /// VLAN id to set
        vlan_id: u16,
    },
    /// Remove the 802.1Q header
    StripVlan,
    /// Rewrite the Ethernet source address
    SetDlSrc {
        /// New source address
        mac: MacAddr,
    },
    /// Rewrite the Ethernet destination address
    SetDlDst {
        /// New destination address
        mac: MacAddr,
    },
}

impl Action {
    /// Output to a port
    pub fn output(port: u16) -> Self {
        Action::Output { port, max_len: 0 }
    }

    /// Port this action outputs to, if it is an output action
    pub fn output_port(&self) -> Option<u16> {
        match self {
            Action::Output { port, .. } => Some(*port),
            _ => None,
        }
    }
}

/// Action list; almost always one or two entries
pub type ActionList = SmallVec<[Action; 4]>;

/// Traffic-matching predicate for a flow entry
///
/// `None` fields are wildcarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Match {
    /// Ingress port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<u16>,
    /// Ethernet source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_src: Option<MacAddr>,
    /// Ethernet destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_dst: Option<MacAddr>,
    /// VLAN id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_vlan: Option<u16>,
    /// Ethernet type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_type: Option<u16>,
}

impl Match {
    /// Wildcard everything
    pub fn any() -> Self {
        Self::default()
    }

    /// Exact L2 match derived from a packet-in
    pub fn from_packet_in(packet_in: &PacketIn) -> Self {
        Self {
            in_port: Some(packet_in.in_port),
            dl_src: Some(packet_in.macsa),
            dl_dst: Some(packet_in.macda),
            dl_vlan: packet_in.vlan_id,
            dl_type: Some(packet_in.eth_type),
        }
    }

    /// Same match with a different ingress port
    pub fn with_in_port(mut self, in_port: u16) -> Self {
        self.in_port = Some(in_port);
        self
    }
}

/// Packet delivered to the controller by a switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketIn {
    /// Port the packet arrived on
    pub in_port: u16,
    /// Buffer id on the switch, if the packet is buffered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<u32>,
    /// Ethernet source address
    pub macsa: MacAddr,
    /// Ethernet destination address
    pub macda: MacAddr,
    /// Ethernet type
    #[serde(default)]
    pub eth_type: u16,
    /// VLAN id, if tagged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    /// Raw frame bytes
    #[serde(default)]
    pub data: Bytes,
}

impl PacketIn {
    /// Create an untagged packet-in
    pub fn new(in_port: u16, macsa: MacAddr, macda: MacAddr) -> Self {
        Self {
            in_port,
            buffer_id: None,
            macsa,
            macda,
            eth_type: 0x0800,
            vlan_id: None,
            data: Bytes::new(),
        }
    }

    /// Destination is a group address
    pub fn is_multicast(&self) -> bool {
        self.macda.is_multicast()
    }
}

bitflags! {
    /// Flow-mod flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FlowModFlags: u16 {
        /// Notify the controller when the entry expires
        const SEND_FLOW_REM = 1 << 0;
        /// Reject overlapping entries
        const CHECK_OVERLAP = 1 << 1;
        /// Emergency flow cache
        const EMERG = 1 << 2;
    }
}

impl Default for FlowModFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Flow table modification (add only; the controller never modifies in place)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMod {
    /// Match for the new entry
    #[serde(rename = "match")]
    pub match_: Match,
    /// Seconds of inactivity before expiry, 0 = never
    pub idle_timeout: u16,
    /// Seconds before expiry regardless of activity, 0 = never
    pub hard_timeout: u16,
    /// Entry priority
    pub priority: u16,
    /// Buffered packet to apply the entry to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<u32>,
    /// Flags
    #[serde(default)]
    pub flags: FlowModFlags,
    /// Actions; empty means drop
    pub actions: ActionList,
}

impl FlowMod {
    /// Add-flow with no timeouts and no actions
    pub fn add(match_: Match) -> Self {
        Self {
            match_,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: DEFAULT_FLOW_PRIORITY,
            buffer_id: None,
            flags: FlowModFlags::empty(),
            actions: ActionList::new(),
        }
    }

    /// Set the idle timeout
    pub fn idle_timeout(mut self, seconds: u16) -> Self {
        self.idle_timeout = seconds;
        self
    }

    /// Set the hard timeout
    pub fn hard_timeout(mut self, seconds: u16) -> Self {
        self.hard_timeout = seconds;
        self
    }

    /// Set the priority
    pub fn priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Set the actions
    pub fn actions<I: IntoIterator<Item = Action>>(mut self, actions: I) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }
}

/// Packet injected into a switch by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketOut {
    /// Buffer id to release, or None to send `data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<u32>,
    /// Ingress port of the original packet
    pub in_port: u16,
    /// Actions to apply
    pub actions: ActionList,
    /// Frame bytes when not buffered
    #[serde(default)]
    pub data: Bytes,
}

impl PacketOut {
    /// Re-inject a packet-in with the given actions
    pub fn from_packet_in<I: IntoIterator<Item = Action>>(packet_in: &PacketIn, actions: I) -> Self {
        Self {
            buffer_id: packet_in.buffer_id,
            in_port: packet_in.in_port,
            actions: actions.into_iter().collect(),
            data: packet_in.data.clone(),
        }
    }

    /// Inject a copy of a packet-in on a switch other than its ingress
    ///
    /// The buffer lives on the ingress switch only, so the frame is sent in
    /// full with no ingress port.
    pub fn unbuffered<I: IntoIterator<Item = Action>>(packet_in: &PacketIn, actions: I) -> Self {
        Self {
            buffer_id: None,
            in_port: OFPP_NONE,
            actions: actions.into_iter().collect(),
            data: packet_in.data.clone(),
        }
    }

    /// Output ports named by the action list
    pub fn output_ports(&self) -> Vec<u16> {
        self.actions.iter().filter_map(Action::output_port).collect()
    }
}

/// Switch configuration (set-config request)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// IP fragment handling flags
    pub flags: u16,
    /// Bytes of each missed packet sent to the controller
    pub miss_send_len: u16,
}

impl SwitchConfig {
    /// Normal fragment handling, full packet bodies
    pub fn full_packets() -> Self {
        Self {
            flags: 0,
            miss_send_len: MAX_MISS_SEND_LEN,
        }
    }
}

/// Physical port description inside a features reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalPort {
    /// Port number
    pub port_no: u16,
    /// Hardware address
    pub hw_addr: MacAddr,
    /// Interface name
    #[serde(default)]
    pub name: String,
}

/// Features reply sent by a switch after the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesReply {
    /// Datapath id of the replying switch
    pub datapath_id: u64,
    /// Number of packet buffers
    #[serde(default)]
    pub n_buffers: u32,
    /// Number of flow tables
    #[serde(default)]
    pub n_tables: u8,
    /// Ports
    #[serde(default)]
    pub ports: Vec<PhysicalPort>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_match_from_packet_in() {
        let mut pin = PacketIn::new(3, mac(1), mac(2));
        pin.vlan_id = Some(10);

        let m = Match::from_packet_in(&pin);
        assert_eq!(m.in_port, Some(3));
        assert_eq!(m.dl_src, Some(mac(1)));
        assert_eq!(m.dl_dst, Some(mac(2)));
        assert_eq!(m.dl_vlan, Some(10));
        assert_eq!(m.dl_type, Some(0x0800));

        let moved = m.with_in_port(7);
        assert_eq!(moved.in_port, Some(7));
        assert_eq!(moved.dl_src, Some(mac(1)));
    }

    #[test]
    fn test_flow_mod_builder() {
        let fm = FlowMod::add(Match::any())
            .idle_timeout(60)
            .hard_timeout(1)
            .priority(100)
            .actions([Action::output(2)]);

        assert_eq!(fm.idle_timeout, 60);
        assert_eq!(fm.hard_timeout, 1);
        assert_eq!(fm.priority, 100);
        assert_eq!(fm.actions.as_slice(), &[Action::output(2)]);
        assert!(fm.flags.is_empty());
    }

    #[test]
    fn test_packet_out_from_packet_in() {
        let mut pin = PacketIn::new(1, mac(1), mac(2));
        pin.buffer_id = Some(42);
        pin.data = Bytes::from_static(b"frame");

        let out = PacketOut::from_packet_in(&pin, [Action::output(2), Action::output(3)]);
        assert_eq!(out.buffer_id, Some(42));
        assert_eq!(out.in_port, 1);
        assert_eq!(out.output_ports(), vec![2, 3]);
        assert_eq!(out.data, Bytes::from_static(b"frame"));

        let remote = PacketOut::unbuffered(&pin, [Action::output(4)]);
        assert_eq!(remote.buffer_id, None);
        assert_eq!(remote.in_port, OFPP_NONE);
        assert_eq!(remote.data, Bytes::from_static(b"frame"));
    }

    #[test]
    fn test_switch_config_full_packets() {
        let config = SwitchConfig::full_packets();
        assert_eq!(config.miss_send_len, 65535);
        assert_eq!(config.flags, 0);
    }

    #[test]
    fn test_multicast_packet_in() {
        assert!(PacketIn::new(1, mac(1), MacAddr::BROADCAST).is_multicast());
        assert!(!PacketIn::new(1, mac(1), mac(2)).is_multicast());
    }
}
