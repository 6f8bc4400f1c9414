//! Forwarding database: learned host MAC -> (switch, port)

use fabric_wire::MacAddr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default aging time in seconds (5 minutes, per IEEE 802.1D)
pub const DEFAULT_FDB_MAX_AGE_SECS: u64 = 300;

/// Last-seen location of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostLocation {
    /// Switch the host was seen on
    pub dpid: u64,
    /// Port the host was seen on
    pub port_no: u16,
}

impl HostLocation {
    /// Create a host location
    pub fn new(dpid: u64, port_no: u16) -> Self {
        Self { dpid, port_no }
    }
}

/// Host location table consulted by the router
pub trait Fdb {
    /// Record that `mac` was seen on `port_no` of `dpid`
    fn learn(&mut self, mac: MacAddr, port_no: u16, dpid: u64);

    /// Where `mac` was last seen, if still known
    fn lookup(&self, mac: &MacAddr) -> Option<HostLocation>;

    /// Drop stale entries; returns how many were removed
    fn age_out(&mut self) -> usize {
        0
    }
}

#[derive(Debug, Clone)]
struct FdbEntry {
    location: HostLocation,
    last_seen: Instant,
}

/// In-memory FDB with aging
///
/// Learning overwrites the previous location of a MAC, so repeated learning
/// never produces duplicate entries. Group addresses are never learned.
#[derive(Debug)]
pub struct MemoryFdb {
    entries: HashMap<MacAddr, FdbEntry>,
    max_age: Duration,
}

impl Default for MemoryFdb {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_FDB_MAX_AGE_SECS))
    }
}

impl MemoryFdb {
    /// Create an FDB whose entries expire after `max_age`
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_age,
        }
    }

    /// Configured maximum age
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Number of entries, including ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn learn_at(&mut self, mac: MacAddr, location: HostLocation, now: Instant) {
        if mac.is_multicast() {
            return;
        }

        let previous = self.entries.insert(
            mac,
            FdbEntry {
                location,
                last_seen: now,
            },
        );

        match previous {
            Some(old) if old.location != location => debug!(
                "Host {} moved from {:#x}:{} to {:#x}:{}",
                mac, old.location.dpid, old.location.port_no, location.dpid, location.port_no
            ),
            None => debug!("Learned host {} at {:#x}:{}", mac, location.dpid, location.port_no),
            _ => {}
        }
    }

    fn lookup_at(&self, mac: &MacAddr, now: Instant) -> Option<HostLocation> {
        self.entries
            .get(mac)
            .filter(|entry| now.saturating_duration_since(entry.last_seen) < self.max_age)
            .map(|entry| entry.location)
    }

    fn age_out_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let max_age = self.max_age;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_seen) < max_age);

        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Aged out {} FDB entries", removed);
        }
        removed
    }
}

impl Fdb for MemoryFdb {
    fn learn(&mut self, mac: MacAddr, port_no: u16, dpid: u64) {
        self.learn_at(mac, HostLocation::new(dpid, port_no), Instant::now());
    }

    fn lookup(&self, mac: &MacAddr) -> Option<HostLocation> {
        self.lookup_at(mac, Instant::now())
    }

    fn age_out(&mut self) -> usize {
        self.age_out_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_learn_and_lookup() {
        let mut fdb = MemoryFdb::default();
        assert_eq!(fdb.lookup(&mac(1)), None);

        fdb.learn(mac(1), 3, 0x1);
        assert_eq!(fdb.lookup(&mac(1)), Some(HostLocation::new(0x1, 3)));
    }

    #[test]
    fn test_learning_is_idempotent() {
        let mut fdb = MemoryFdb::default();
        fdb.learn(mac(1), 3, 0x1);
        fdb.learn(mac(1), 3, 0x1);

        assert_eq!(fdb.len(), 1);
        assert_eq!(fdb.lookup(&mac(1)), Some(HostLocation::new(0x1, 3)));
    }

    #[test]
    fn test_host_move_overwrites() {
        let mut fdb = MemoryFdb::default();
        fdb.learn(mac(1), 3, 0x1);
        fdb.learn(mac(1), 4, 0x2);

        assert_eq!(fdb.len(), 1);
        assert_eq!(fdb.lookup(&mac(1)), Some(HostLocation::new(0x2, 4)));
    }

    #[test]
    fn test_multicast_not_learned() {
        let mut fdb = MemoryFdb::default();
        fdb.learn(MacAddr::BROADCAST, 1, 0x1);
        fdb.learn(MacAddr::new([0x01, 0, 0x5e, 0, 0, 1]), 1, 0x1);
        assert!(fdb.is_empty());
    }

    #[test]
    fn test_aging() {
        let mut fdb = MemoryFdb::new(Duration::from_secs(10));
        let start = Instant::now();
        fdb.learn_at(mac(1), HostLocation::new(1, 1), start);
        fdb.learn_at(mac(2), HostLocation::new(1, 2), start + Duration::from_secs(8));

        let later = start + Duration::from_secs(12);
        assert_eq!(fdb.lookup_at(&mac(1), later), None);
        assert_eq!(fdb.lookup_at(&mac(2), later), Some(HostLocation::new(1, 2)));

        assert_eq!(fdb.age_out_at(later), 1);
        assert_eq!(fdb.len(), 1);
    }
}
