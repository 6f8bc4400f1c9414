//! Packet-in decision logic: learn, resolve, install or flood

use crate::error::RoutingError;
use crate::fdb::{Fdb, HostLocation};
use crate::path::{Hop, Path, PathOptions};
use crate::resolver::PathResolver;
use fabric_topology::SwitchDs;
use fabric_wire::{
    Action, ControllerEvent, FeaturesReply, FlowMod, LinkStatus, Match, MessageSender, PacketIn,
    PacketOut, PortStatus, SwitchConfig, DEFAULT_FLOW_PRIORITY,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Default base idle timeout for installed paths, in seconds
pub const DEFAULT_IDLE_TIMEOUT: u16 = 60;

/// Hard timeout of the drop rule installed for unresolvable packets
pub const DISCARD_HARD_TIMEOUT: u16 = 1;

/// Outcome of one packet-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketInDecision {
    /// Flow entries installed along a path and the packet sent from its egress
    InstallPath {
        /// Number of hops programmed
        hops: usize,
    },
    /// Destination unknown; packet flooded
    Flood {
        /// Switches a packet-out was sent to
        switches: usize,
    },
    /// Packet not forwarded
    Drop(DropReason),
}

/// Reason for not forwarding a packet-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Arrived on a port the topology does not accept traffic from
    InvalidInPort,
    /// Destination is a group address
    Multicast,
    /// Destination known but unreachable; a short drop rule was installed
    NoPath,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::InvalidInPort => write!(f, "invalid ingress port"),
            DropReason::Multicast => write!(f, "multicast destination"),
            DropReason::NoPath => write!(f, "no path to destination"),
        }
    }
}

/// Tunables for installed flow entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Base idle timeout; each hop gets this plus its distance to the egress
    pub idle_timeout: u16,
    /// Hard timeout for path entries, 0 = none
    pub hard_timeout: u16,
    /// Priority for path entries
    pub priority: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            hard_timeout: 0,
            priority: DEFAULT_FLOW_PRIORITY,
        }
    }
}

impl RouterConfig {
    fn path_options(&self) -> PathOptions {
        PathOptions::new(self.idle_timeout, self.hard_timeout, self.priority)
    }
}

/// Router statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterStats {
    /// Packet-in events handled
    pub packets_in: u64,
    /// Packets refused for arriving on an invalid port
    pub rejected: u64,
    /// Packets to group addresses
    pub multicast_dropped: u64,
    /// Packets flooded
    pub flooded: u64,
    /// Paths installed
    pub paths_installed: u64,
    /// Packets with a known but unreachable destination
    pub discarded: u64,
    /// Flow-mods sent, including drop rules
    pub flow_mods_sent: u64,
    /// Packet-outs sent
    pub packet_outs_sent: u64,
    /// Breakdown of drop reasons
    pub drop_reasons: HashMap<String, u64>,
}

/// Topology-aware forwarding engine
///
/// Handles one event to completion before the next; all state is owned
/// here, so no locking is involved. Sends are fire-and-forget and nothing
/// already sent is withdrawn when the topology later changes; stale entries
/// expire through their timeouts.
#[derive(Debug)]
pub struct Router<F, R, S> {
    topology: SwitchDs,
    fdb: F,
    resolver: R,
    sender: S,
    config: RouterConfig,
    stats: RouterStats,
}

impl<F, R, S> Router<F, R, S>
where
    F: Fdb,
    R: PathResolver,
    S: MessageSender,
{
    /// Create a router with an empty topology
    pub fn new(fdb: F, resolver: R, sender: S, config: RouterConfig) -> Self {
        Self {
            topology: SwitchDs::new(),
            fdb,
            resolver,
            sender,
            config,
            stats: RouterStats::default(),
        }
    }

    /// Dispatch one controller event
    pub fn handle_event(&mut self, event: ControllerEvent) -> Result<(), RoutingError> {
        match event {
            ControllerEvent::SwitchReady { dpid } => self.switch_ready(dpid),
            ControllerEvent::FeaturesReply(reply) => self.features_reply(&reply),
            ControllerEvent::PortStatus(status) => {
                self.port_status(&status);
                Ok(())
            }
            ControllerEvent::LinkStatus(status) => {
                self.link_status(&status);
                Ok(())
            }
            ControllerEvent::PacketIn { dpid, packet } => self.packet_in(dpid, &packet).map(|_| ()),
        }
    }

    /// Switch connected: start the handshake
    pub fn switch_ready(&mut self, datapath_id: u64) -> Result<(), RoutingError> {
        info!("Switch {:#x} is ready", datapath_id);
        self.sender.send_features_request(datapath_id)?;
        Ok(())
    }

    /// Handshake finished: ask for whole packets on packet-in
    pub fn features_reply(&mut self, message: &FeaturesReply) -> Result<(), RoutingError> {
        debug!(
            "Features reply from {:#x} ({} ports)",
            message.datapath_id,
            message.ports.len()
        );
        self.sender
            .send_set_config(message.datapath_id, SwitchConfig::full_packets())?;
        Ok(())
    }

    /// Port added or removed
    pub fn port_status(&mut self, message: &PortStatus) {
        self.topology.process_port_status(message);
    }

    /// Link discovered or lost
    pub fn link_status(&mut self, message: &LinkStatus) {
        self.topology.process_link_status(message);
    }

    /// Whether packets from this port are processed at all
    pub fn validate_in_port(&self, datapath_id: u64, in_port: u16) -> bool {
        self.topology.validate_port(datapath_id, in_port)
    }

    /// Learn the source, then install a path or flood
    pub fn packet_in(
        &mut self,
        datapath_id: u64,
        message: &PacketIn,
    ) -> Result<PacketInDecision, RoutingError> {
        self.stats.packets_in += 1;

        if !self.validate_in_port(datapath_id, message.in_port) {
            debug!(
                "Ignoring packet from {} on invalid port {:#x}:{}",
                message.macsa, datapath_id, message.in_port
            );
            return Ok(self.dropped(DropReason::InvalidInPort));
        }

        if message.is_multicast() {
            debug!("Ignoring multicast packet to {}", message.macda);
            return Ok(self.dropped(DropReason::Multicast));
        }

        self.fdb.learn(message.macsa, message.in_port, datapath_id);

        match self.fdb.lookup(&message.macda) {
            Some(dest) => self.make_path(datapath_id, message, dest),
            None => {
                let switches = self.flood_packet(datapath_id, message)?;
                Ok(PacketInDecision::Flood { switches })
            }
        }
    }

    /// Resolve a path to a known destination and program it
    pub fn make_path(
        &mut self,
        in_datapath_id: u64,
        message: &PacketIn,
        dest: HostLocation,
    ) -> Result<PacketInDecision, RoutingError> {
        let hops = self.resolver.resolve(
            &self.topology,
            in_datapath_id,
            message.in_port,
            dest.dpid,
            dest.port_no,
        );

        let Some(hops) = hops.filter(|hops| !hops.is_empty()) else {
            debug!(
                "No path from {:#x}:{} to {:#x}:{} for {}",
                in_datapath_id, message.in_port, dest.dpid, dest.port_no, message.macda
            );
            self.discard_packet_in(in_datapath_id, message)?;
            return Ok(self.dropped(DropReason::NoPath));
        };

        let mut path = Path::new(Match::from_packet_in(message), self.config.path_options());
        path.append_hops(hops);

        self.modify_flow_entry(&path)?;
        if let Some(last_hop) = path.last_hop() {
            self.output_packet_from_last_switch(in_datapath_id, last_hop, message)?;
        }

        self.stats.paths_installed += 1;
        info!(
            "Installed {} hop path {} -> {} ({:#x} -> {:#x})",
            path.len(),
            message.macsa,
            message.macda,
            in_datapath_id,
            dest.dpid
        );
        Ok(PacketInDecision::InstallPath { hops: path.len() })
    }

    /// Install one flow entry per hop, ingress first
    ///
    /// Hop `i` of `n` gets `idle_timeout + (n - i)`, so entries nearer the
    /// egress expire first and a half-expired path never keeps its head
    /// alive while its tail is gone.
    pub fn modify_flow_entry(&mut self, path: &Path) -> Result<(), RoutingError> {
        let options = *path.options();
        let total = path.len();

        for (i, hop) in path.hops().iter().enumerate() {
            let remaining = u16::try_from(total - i).unwrap_or(u16::MAX);
            let actions = hop
                .actions()
                .iter()
                .cloned()
                .chain(std::iter::once(Action::output(hop.out_port())));

            let flow_mod = FlowMod::add(path.match_().clone().with_in_port(hop.in_port()))
                .idle_timeout(options.idle_timeout.saturating_add(remaining))
                .hard_timeout(options.hard_timeout)
                .priority(options.priority)
                .actions(actions);

            debug!(
                "Flow-mod on {:#x}: in_port={} out_port={} idle_timeout={}",
                hop.datapath_id(),
                hop.in_port(),
                hop.out_port(),
                flow_mod.idle_timeout
            );
            self.sender.send_flow_mod_add(hop.datapath_id(), flow_mod)?;
            self.stats.flow_mods_sent += 1;
        }

        Ok(())
    }

    /// Deliver the in-flight packet straight out of the egress switch
    pub fn output_packet_from_last_switch(
        &mut self,
        in_datapath_id: u64,
        last_hop: &Hop,
        message: &PacketIn,
    ) -> Result<(), RoutingError> {
        let actions = [Action::output(last_hop.out_port())];
        let packet_out = if last_hop.datapath_id() == in_datapath_id {
            PacketOut::from_packet_in(message, actions)
        } else {
            PacketOut::unbuffered(message, actions)
        };

        self.sender
            .send_packet_out(last_hop.datapath_id(), packet_out)?;
        self.stats.packet_outs_sent += 1;
        Ok(())
    }

    /// Install a one-second drop rule at the ingress switch
    ///
    /// Suppresses a storm of identical packet-ins while the destination is
    /// unreachable.
    pub fn discard_packet_in(
        &mut self,
        datapath_id: u64,
        message: &PacketIn,
    ) -> Result<(), RoutingError> {
        let flow_mod = FlowMod::add(Match::from_packet_in(message))
            .hard_timeout(DISCARD_HARD_TIMEOUT)
            .priority(self.config.priority);

        self.sender.send_flow_mod_add(datapath_id, flow_mod)?;
        self.stats.flow_mods_sent += 1;
        Ok(())
    }

    /// Send the packet out of every action port of every switch
    ///
    /// The ingress port is skipped on the originating switch only. Returns
    /// the number of switches a packet-out went to.
    pub fn flood_packet(
        &mut self,
        datapath_id: u64,
        message: &PacketIn,
    ) -> Result<usize, RoutingError> {
        let mut outputs: Vec<(u64, Vec<Action>)> = Vec::new();

        for (dpid, ports) in &self.topology {
            let actions: Vec<Action> = ports
                .values()
                .filter(|port| port.is_action_port())
                .filter(|port| !(dpid == datapath_id && port.port_no == message.in_port))
                .map(|port| Action::output(port.port_no))
                .collect();

            if !actions.is_empty() {
                outputs.push((dpid, actions));
            }
        }

        let switches = outputs.len();
        for (dpid, actions) in outputs {
            let packet_out = if dpid == datapath_id {
                PacketOut::from_packet_in(message, actions)
            } else {
                PacketOut::unbuffered(message, actions)
            };
            self.sender.send_packet_out(dpid, packet_out)?;
            self.stats.packet_outs_sent += 1;
        }

        self.stats.flooded += 1;
        debug!(
            "Flooded packet {} -> {} to {} switches",
            message.macsa, message.macda, switches
        );
        Ok(switches)
    }

    /// Purge stale host locations
    pub fn age_out_hosts(&mut self) -> usize {
        self.fdb.age_out()
    }

    fn dropped(&mut self, reason: DropReason) -> PacketInDecision {
        match reason {
            DropReason::InvalidInPort => self.stats.rejected += 1,
            DropReason::Multicast => self.stats.multicast_dropped += 1,
            DropReason::NoPath => self.stats.discarded += 1,
        }
        *self.stats.drop_reasons.entry(reason.to_string()).or_insert(0) += 1;
        if reason == DropReason::NoPath {
            warn!("Dropping packet: {}", reason);
        }
        PacketInDecision::Drop(reason)
    }

    /// Topology store
    pub fn topology(&self) -> &SwitchDs {
        &self.topology
    }

    /// Host table
    pub fn fdb(&self) -> &F {
        &self.fdb
    }

    /// Command sink
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Mutable command sink
    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    /// Active configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Counters so far
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }
}
