//! Controller events (switch to controller) and commands (controller to switch).

use crate::message::{FeaturesReply, FlowMod, PacketIn, PacketOut, SwitchConfig};
use crate::topology::{LinkStatus, PortStatus};
use serde::{Deserialize, Serialize};

/// Input to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A switch finished connecting
    SwitchReady {
        /// Datapath id
        dpid: u64,
    },
    /// Reply to a features request
    FeaturesReply(FeaturesReply),
    /// Port added/removed
    PortStatus(PortStatus),
    /// Link discovered/lost
    LinkStatus(LinkStatus),
    /// Packet punted to the controller
    PacketIn {
        /// Datapath id of the switch that sent it
        dpid: u64,
        /// The packet
        #[serde(flatten)]
        packet: PacketIn,
    },
}

impl ControllerEvent {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerEvent::SwitchReady { .. } => "switch_ready",
            ControllerEvent::FeaturesReply(_) => "features_reply",
            ControllerEvent::PortStatus(_) => "port_status",
            ControllerEvent::LinkStatus(_) => "link_status",
            ControllerEvent::PacketIn { .. } => "packet_in",
        }
    }
}

/// Output of the controller, addressed to one switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerCommand {
    /// Start the handshake
    FeaturesRequest {
        /// Target switch
        dpid: u64,
    },
    /// Configure the switch
    SetConfig {
        /// Target switch
        dpid: u64,
        /// Configuration
        #[serde(flatten)]
        config: SwitchConfig,
    },
    /// Install a flow entry
    FlowMod {
        /// Target switch
        dpid: u64,
        /// Entry to add
        #[serde(flatten)]
        flow_mod: FlowMod,
    },
    /// Inject a packet
    PacketOut {
        /// Target switch
        dpid: u64,
        /// Packet and actions
        #[serde(flatten)]
        packet_out: PacketOut,
    },
}

impl ControllerCommand {
    /// Switch the command is addressed to
    pub fn dpid(&self) -> u64 {
        match self {
            ControllerCommand::FeaturesRequest { dpid }
            | ControllerCommand::SetConfig { dpid, .. }
            | ControllerCommand::FlowMod { dpid, .. }
            | ControllerCommand::PacketOut { dpid, .. } => *dpid,
        }
    }
}

/// Fire-and-forget sink for commands towards switches
///
/// Implementations must not block waiting for switch acknowledgement.
pub trait MessageSender {
    /// Hand a command to the transport
    fn send(&mut self, command: ControllerCommand) -> Result<(), crate::WireError>;

    /// Add a flow entry on `dpid`
    fn send_flow_mod_add(&mut self, dpid: u64, flow_mod: FlowMod) -> Result<(), crate::WireError> {
        self.send(ControllerCommand::FlowMod { dpid, flow_mod })
    }

    /// Inject a packet on `dpid`
    fn send_packet_out(&mut self, dpid: u64, packet_out: PacketOut) -> Result<(), crate::WireError> {
        self.send(ControllerCommand::PacketOut { dpid, packet_out })
    }

    /// Ask `dpid` for its features
    fn send_features_request(&mut self, dpid: u64) -> Result<(), crate::WireError> {
        self.send(ControllerCommand::FeaturesRequest { dpid })
    }

    /// Configure `dpid`
    fn send_set_config(&mut self, dpid: u64, config: SwitchConfig) -> Result<(), crate::WireError> {
        self.send(ControllerCommand::SetConfig { dpid, config })
    }
}

impl MessageSender for Vec<ControllerCommand> {
    fn send(&mut self, command: ControllerCommand) -> Result<(), crate::WireError> {
        self.push(command);
        Ok(())
    }
}
