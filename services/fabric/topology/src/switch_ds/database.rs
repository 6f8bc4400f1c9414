//! SwitchDs implementation methods.

use super::{SwitchDs, SwitchPorts};
use crate::port::{LinkDirection, Port, PortKey};
use fabric_wire::{LinkState, LinkStatus, PortState, PortStatus};
use std::collections::btree_map;
use tracing::{debug, info};

impl SwitchDs {
    /// Create an empty topology store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a port, or update `external_link` on an existing one
    pub fn add_port_to_switch(&mut self, dpid: u64, port_no: u16, external_link: bool) {
        let ports = self.switches.entry(dpid).or_default();
        match ports.get_mut(&port_no) {
            Some(port) => {
                port.external_link = external_link;
                debug!("Updated port {:#x}:{} (external: {})", dpid, port_no, external_link);
            }
            None => {
                ports.insert(port_no, Port::new(port_no, external_link));
                info!("Added port {:#x}:{} (external: {})", dpid, port_no, external_link);
            }
        }
    }

    /// Port record, if both the switch and the port are known
    pub fn lookup_port(&self, dpid: u64, port_no: u16) -> Option<&Port> {
        self.switches.get(&dpid)?.get(&port_no)
    }

    fn lookup_port_mut(&mut self, dpid: u64, port_no: u16) -> Option<&mut Port> {
        self.switches.get_mut(&dpid)?.get_mut(&port_no)
    }

    /// Remove a port; no-op if unknown
    pub fn delete_port(&mut self, dpid: u64, port_no: u16) {
        let removed = self
            .switches
            .get_mut(&dpid)
            .and_then(|ports| ports.remove(&port_no));

        if removed.is_some() {
            info!("Deleted port {:#x}:{}", dpid, port_no);
        }
    }

    /// Set one half of the link state on a port; no-op if unknown
    ///
    /// External ports never carry switch-to-switch link state, so updates
    /// addressed to them are ignored.
    pub fn update_link(
        &mut self,
        dpid: u64,
        port_no: u16,
        status: LinkState,
        which_link: impl Into<LinkDirection>,
    ) {
        let which_link = which_link.into();
        let Some(port) = self.lookup_port_mut(dpid, port_no) else {
            debug!("Link update for unknown port {:#x}:{}", dpid, port_no);
            return;
        };

        if port.external_link {
            debug!("Ignoring link update on external port {:#x}:{}", dpid, port_no);
            return;
        }

        port.set_link(which_link, status.is_up());
        debug!(
            "Link {:?} on {:#x}:{} is now {:?}",
            which_link, dpid, port_no, status
        );
    }

    /// Whether a packet arriving on this port should be processed
    ///
    /// An internal port whose peer confirmed the link must be fully
    /// forwarding. Any other port is trusted as an ingress point: external
    /// ports, unknown ports, and internal ports still in link discovery.
    pub fn validate_port(&self, dpid: u64, port_no: u16) -> bool {
        match self.lookup_port(dpid, port_no) {
            Some(port) if !port.external_link && port.switch_to_switch_link_reverse => {
                port.is_forwarding_port()
            }
            _ => true,
        }
    }

    /// Apply a port-status notification
    pub fn process_port_status(&mut self, message: &PortStatus) {
        match message.status {
            PortState::Up => self.add_port_to_switch(message.dpid, message.port_no, message.external),
            PortState::Down => self.delete_port(message.dpid, message.port_no),
        }
    }

    /// Apply a link-status notification
    ///
    /// Marks the forward half on the origin port and, when discovery saw the
    /// far end, the reverse half on the peer port. The far end counts as seen
    /// only when both `to_dpid` and `to_port_no` are present; a notification
    /// carrying just one of them updates the origin port alone.
    pub fn process_link_status(&mut self, message: &LinkStatus) {
        let from = PortKey::new(message.from_dpid, message.from_port_no);
        self.update_link(from.dpid, from.port_no, message.status, LinkDirection::Forward);

        if let Some((to_dpid, to_port_no)) = message.peer() {
            let to = PortKey::new(to_dpid, to_port_no);
            self.update_link(to.dpid, to.port_no, message.status, LinkDirection::Reverse);
            self.record_peer(from, to);
            self.record_peer(to, from);
        }
    }

    fn record_peer(&mut self, at: PortKey, peer: PortKey) {
        if let Some(port) = self.lookup_port_mut(at.dpid, at.port_no) {
            if !port.external_link {
                port.peer = Some(peer);
            }
        }
    }

    /// Ports of one switch
    pub fn ports(&self, dpid: u64) -> Option<&SwitchPorts> {
        self.switches.get(&dpid)
    }

    /// Restartable iteration over `(dpid, ports)` in dpid order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.switches.iter(),
        }
    }

    /// Usable directed adjacencies: forwarding ports whose peer port is known
    pub fn links(&self) -> impl Iterator<Item = (PortKey, PortKey)> + '_ {
        self.iter().flat_map(move |(dpid, ports)| {
            ports.values().filter_map(move |port| {
                let peer = port.peer?;
                if !port.is_forwarding_port() || self.lookup_port(peer.dpid, peer.port_no).is_none() {
                    return None;
                }
                Some((PortKey::new(dpid, port.port_no), peer))
            })
        })
    }

    /// Number of known switches
    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    /// Number of known ports across all switches
    pub fn port_count(&self) -> usize {
        self.switches.values().map(|ports| ports.len()).sum()
    }

    /// Snapshot counters
    pub fn stats(&self) -> TopologyStats {
        let mut stats = TopologyStats {
            total_switches: self.switches.len(),
            ..TopologyStats::default()
        };

        for port in self.switches.values().flat_map(|ports| ports.values()) {
            stats.total_ports += 1;
            if port.external_link {
                stats.external_ports += 1;
            }
            if port.is_forwarding_port() {
                stats.forwarding_ports += 1;
            }
        }

        stats
    }
}

/// Iterator over `(dpid, ports)`
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, u64, SwitchPorts>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (u64, &'a SwitchPorts);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(dpid, ports)| (*dpid, ports))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a SwitchDs {
    type Item = (u64, &'a SwitchPorts);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Topology store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyStats {
    /// Known switches
    pub total_switches: usize,
    /// Known ports
    pub total_ports: usize,
    /// Ports facing hosts
    pub external_ports: usize,
    /// Internal ports with a confirmed bidirectional link
    pub forwarding_ports: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_up(ds: &mut SwitchDs, a: (u64, u16), b: (u64, u16)) {
        ds.process_link_status(&LinkStatus::between(a, b, LinkState::Up));
        ds.process_link_status(&LinkStatus::between(b, a, LinkState::Up));
    }

    #[test]
    fn test_add_lookup_and_update() {
        let mut ds = SwitchDs::new();
        assert!(ds.lookup_port(1, 1).is_none());

        ds.add_port_to_switch(1, 1, false);
        let port = ds.lookup_port(1, 1).unwrap();
        assert!(!port.external_link);

        ds.add_port_to_switch(1, 1, true);
        assert!(ds.lookup_port(1, 1).unwrap().external_link);
        assert_eq!(ds.port_count(), 1);
        assert_eq!(ds.switch_count(), 1);
    }

    #[test]
    fn test_unknown_keys_are_not_found() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 1, false);

        assert!(ds.lookup_port(2, 1).is_none());
        assert!(ds.lookup_port(1, 9).is_none());

        // mutations on unknown ports are no-ops
        ds.delete_port(2, 1);
        ds.update_link(1, 9, LinkState::Up, 0u8);
        assert_eq!(ds.port_count(), 1);
    }

    #[test]
    fn test_delete_port() {
        let mut ds = SwitchDs::new();
        ds.process_port_status(&PortStatus::up(1, 1, true));
        ds.process_port_status(&PortStatus::up(1, 2, false));
        ds.process_port_status(&PortStatus::down(1, 1));

        assert!(ds.lookup_port(1, 1).is_none());
        assert!(ds.lookup_port(1, 2).is_some());
        // the switch entry outlives its ports
        ds.process_port_status(&PortStatus::down(1, 2));
        assert_eq!(ds.switch_count(), 1);
        assert_eq!(ds.port_count(), 0);
    }

    #[test]
    fn test_update_link_directions() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 1, false);

        ds.update_link(1, 1, LinkState::Up, 0u8);
        let port = ds.lookup_port(1, 1).unwrap();
        assert!(port.switch_to_switch_link);
        assert!(!port.switch_to_switch_link_reverse);

        ds.update_link(1, 1, LinkState::Up, 1u8);
        assert!(ds.lookup_port(1, 1).unwrap().is_forwarding_port());

        ds.update_link(1, 1, LinkState::Down, LinkDirection::Forward);
        assert!(!ds.lookup_port(1, 1).unwrap().is_forwarding_port());
    }

    #[test]
    fn test_external_port_ignores_link_updates() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 1, true);
        ds.update_link(1, 1, LinkState::Up, LinkDirection::Reverse);

        let port = ds.lookup_port(1, 1).unwrap();
        assert!(!port.switch_to_switch_link_reverse);
        assert!(port.is_action_port());
    }

    #[test]
    fn test_process_link_status_sets_both_halves() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 2, false);
        ds.add_port_to_switch(2, 1, false);

        ds.process_link_status(&LinkStatus::between((1, 2), (2, 1), LinkState::Up));
        let a = ds.lookup_port(1, 2).unwrap();
        let b = ds.lookup_port(2, 1).unwrap();
        assert!(a.switch_to_switch_link);
        assert!(!a.switch_to_switch_link_reverse);
        assert!(!b.switch_to_switch_link);
        assert!(b.switch_to_switch_link_reverse);
        assert_eq!(a.peer, Some(PortKey::new(2, 1)));
        assert_eq!(b.peer, Some(PortKey::new(1, 2)));

        ds.process_link_status(&LinkStatus::between((2, 1), (1, 2), LinkState::Up));
        assert!(ds.lookup_port(1, 2).unwrap().is_forwarding_port());
        assert!(ds.lookup_port(2, 1).unwrap().is_forwarding_port());
    }

    #[test]
    fn test_process_link_status_without_peer() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 2, false);
        ds.process_link_status(&LinkStatus::dangling((1, 2), LinkState::Up));

        let port = ds.lookup_port(1, 2).unwrap();
        assert!(port.switch_to_switch_link);
        assert!(!port.switch_to_switch_link_reverse);
        assert_eq!(port.peer, None);
    }

    #[test]
    fn test_validate_port() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 1, true);
        ds.add_port_to_switch(1, 2, false);
        ds.add_port_to_switch(2, 1, false);

        // unknown and external ports are trusted
        assert!(ds.validate_port(9, 9));
        assert!(ds.validate_port(1, 1));

        // internal port still in discovery is trusted
        assert!(ds.validate_port(1, 2));

        // forward half only
        ds.update_link(1, 2, LinkState::Up, LinkDirection::Forward);
        assert!(ds.validate_port(1, 2));

        link_up(&mut ds, (1, 2), (2, 1));
        assert!(ds.validate_port(1, 2));
        assert!(ds.validate_port(2, 1));

        // peer still confirms the link but our side lost it
        ds.update_link(1, 2, LinkState::Down, LinkDirection::Forward);
        assert!(!ds.validate_port(1, 2));
    }

    #[test]
    fn test_link_status_with_half_peer_updates_origin_only() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 2, false);
        ds.add_port_to_switch(2, 1, false);

        let mut status = LinkStatus::dangling((1, 2), LinkState::Up);
        status.to_port_no = Some(1);
        ds.process_link_status(&status);

        assert!(ds.lookup_port(1, 2).unwrap().switch_to_switch_link);
        assert_eq!(ds.lookup_port(1, 2).unwrap().peer, None);
        let far = ds.lookup_port(2, 1).unwrap();
        assert!(!far.switch_to_switch_link_reverse);
        assert_eq!(far.peer, None);
    }

    #[test]
    fn test_validate_port_reverse_only() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 2, false);
        ds.update_link(1, 2, LinkState::Up, 1u8);

        let port = ds.lookup_port(1, 2).unwrap();
        assert!(!port.switch_to_switch_link);
        assert!(port.switch_to_switch_link_reverse);
        assert!(!ds.validate_port(1, 2));
    }

    #[test]
    fn test_iteration_is_restartable_and_ordered() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(3, 1, true);
        ds.add_port_to_switch(1, 2, true);
        ds.add_port_to_switch(1, 1, true);
        ds.add_port_to_switch(2, 1, true);

        let first: Vec<u64> = ds.iter().map(|(dpid, _)| dpid).collect();
        let second: Vec<u64> = (&ds).into_iter().map(|(dpid, _)| dpid).collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(first, second);

        let ports: Vec<u16> = ds.ports(1).unwrap().keys().copied().collect();
        assert_eq!(ports, vec![1, 2]);
    }

    #[test]
    fn test_links_only_confirmed() {
        let mut ds = SwitchDs::new();
        for (dpid, port) in [(1, 2), (2, 1), (2, 2), (3, 1)] {
            ds.add_port_to_switch(dpid, port, false);
        }
        link_up(&mut ds, (1, 2), (2, 1));
        // half-discovered link does not count
        ds.process_link_status(&LinkStatus::between((2, 2), (3, 1), LinkState::Up));

        let mut links: Vec<(PortKey, PortKey)> = ds.links().collect();
        links.sort();
        assert_eq!(
            links,
            vec![
                (PortKey::new(1, 2), PortKey::new(2, 1)),
                (PortKey::new(2, 1), PortKey::new(1, 2)),
            ]
        );
    }

    #[test]
    fn test_stats() {
        let mut ds = SwitchDs::new();
        ds.add_port_to_switch(1, 1, true);
        ds.add_port_to_switch(1, 2, false);
        ds.add_port_to_switch(2, 1, false);
        link_up(&mut ds, (1, 2), (2, 1));

        let stats = ds.stats();
        assert_eq!(stats.total_switches, 2);
        assert_eq!(stats.total_ports, 3);
        assert_eq!(stats.external_ports, 1);
        assert_eq!(stats.forwarding_ports, 2);
    }
}
