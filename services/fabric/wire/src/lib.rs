//! OpenFlow message objects, controller events/commands and the JSON-lines codec for fabric.
//!
//! This crate holds the value types the forwarding engine exchanges with
//! switches and with the topology discovery service. It does not frame the
//! binary OpenFlow protocol; a transport in front of the controller turns
//! wire messages into [`ControllerEvent`]s and [`ControllerCommand`]s into
//! wire messages.
//!
//! ## Line format
//!
//! ```text
//! {"type":"port_status","dpid":1,"port_no":1,"status":"up","external":true}
//! {"type":"link_status","from_dpid":1,"from_port_no":2,"to_dpid":2,"to_port_no":1,"status":"up"}
//! {"type":"packet_in","dpid":1,"in_port":1,"macsa":"00:00:00:00:00:01","macda":"ff:ff:ff:ff:ff:ff"}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod event;
pub mod mac;
pub mod message;
pub mod topology;

// Re-export main types
pub use codec::{decode_event, encode_command, encode_event, EventDecoder};
pub use error::WireError;
pub use event::{ControllerCommand, ControllerEvent, MessageSender};
pub use mac::MacAddr;
pub use message::{
    Action, ActionList, FeaturesReply, FlowMod, FlowModFlags, Match, PacketIn, PacketOut,
    PhysicalPort, SwitchConfig, DEFAULT_FLOW_PRIORITY, MAX_MISS_SEND_LEN, OFPP_MAX, OFPP_NONE,
};
pub use topology::{LinkState, LinkStatus, PortState, PortStatus};
