//! Path resolution: (ingress switch/port, egress switch/port) -> ordered hops

use crate::error::{PathError, RoutingError};
use crate::path::Hop;
use fabric_topology::{PortKey, SwitchDs};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::Path as FsPath;
use tracing::{debug, info};

/// Turns two host attachment points into a hop list
///
/// Resolution is synchronous and bounded by the implementation; the router
/// applies no timeout of its own.
pub trait PathResolver {
    /// Hops from `(in_dpid, in_port)` to `(out_dpid, out_port)`, ingress first,
    /// or `None` when no path exists
    fn resolve(
        &self,
        topology: &SwitchDs,
        in_dpid: u64,
        in_port: u16,
        out_dpid: u64,
        out_port: u16,
    ) -> Option<Vec<Hop>>;
}

impl<T: PathResolver + ?Sized> PathResolver for Box<T> {
    fn resolve(
        &self,
        topology: &SwitchDs,
        in_dpid: u64,
        in_port: u16,
        out_dpid: u64,
        out_port: u16,
    ) -> Option<Vec<Hop>> {
        (**self).resolve(topology, in_dpid, in_port, out_dpid, out_port)
    }
}

/// Fewest-switches path over confirmed links (Dijkstra with unit cost)
#[derive(Debug, Clone, Default)]
pub struct ShortestPathResolver;

impl ShortestPathResolver {
    /// Create a resolver
    pub fn new() -> Self {
        Self
    }

    /// Links crossed from `src` to `dst`, in order; empty when `src == dst`
    fn segments(topology: &SwitchDs, src: u64, dst: u64) -> Option<Vec<(PortKey, PortKey)>> {
        if src == dst {
            return Some(Vec::new());
        }

        let mut adjacency: HashMap<u64, Vec<(PortKey, PortKey)>> = HashMap::new();
        for (from, to) in topology.links() {
            adjacency.entry(from.dpid).or_default().push((from, to));
        }

        let mut distances: HashMap<u64, u32> = HashMap::new();
        let mut previous: HashMap<u64, (PortKey, PortKey)> = HashMap::new();
        let mut unvisited: BinaryHeap<Reverse<(u32, u64)>> = BinaryHeap::new();

        distances.insert(src, 0);
        unvisited.push(Reverse((0, src)));

        while let Some(Reverse((current_dist, current))) = unvisited.pop() {
            // Skip if we've already found a better path
            if current_dist > distances.get(&current).copied().unwrap_or(u32::MAX) {
                continue;
            }
            if current == dst {
                break;
            }

            for &(from, to) in adjacency.get(&current).map(Vec::as_slice).unwrap_or_default() {
                let new_dist = current_dist.saturating_add(1);
                if new_dist < distances.get(&to.dpid).copied().unwrap_or(u32::MAX) {
                    distances.insert(to.dpid, new_dist);
                    previous.insert(to.dpid, (from, to));
                    unvisited.push(Reverse((new_dist, to.dpid)));
                }
            }
        }

        // Walk back from the destination
        let mut segments = Vec::new();
        let mut node = dst;
        while node != src {
            let &(from, to) = previous.get(&node)?;
            segments.push((from, to));
            node = from.dpid;
        }
        segments.reverse();
        Some(segments)
    }
}

impl PathResolver for ShortestPathResolver {
    fn resolve(
        &self,
        topology: &SwitchDs,
        in_dpid: u64,
        in_port: u16,
        out_dpid: u64,
        out_port: u16,
    ) -> Option<Vec<Hop>> {
        if in_dpid == out_dpid && in_port == out_port {
            debug!("Source and destination share port {:#x}:{}", in_dpid, in_port);
            return None;
        }

        let Some(segments) = Self::segments(topology, in_dpid, out_dpid) else {
            debug!("No path from {:#x} to {:#x}", in_dpid, out_dpid);
            return None;
        };

        let mut hops = Vec::with_capacity(segments.len() + 1);
        let mut dpid = in_dpid;
        let mut entry_port = in_port;
        for (from, to) in segments {
            hops.push(Hop::new(dpid, entry_port, from.port_no));
            dpid = to.dpid;
            entry_port = to.port_no;
        }
        hops.push(Hop::new(dpid, entry_port, out_port));

        debug!(
            "Resolved {} hop path {:#x}:{} -> {:#x}:{}",
            hops.len(),
            in_dpid,
            in_port,
            out_dpid,
            out_port
        );
        Some(hops)
    }
}

/// Operator-pinned paths
///
/// File format: a JSON array of
/// `{"from": [dpid, port], "to": [dpid, port], "hops": [hop, ...]}`.
/// Requests with no pinned path resolve to `None`.
#[derive(Debug, Clone, Default)]
pub struct StaticPathResolver {
    paths: HashMap<(PortKey, PortKey), Vec<Hop>>,
}

impl StaticPathResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a path
    pub fn insert(&mut self, from: PortKey, to: PortKey, hops: Vec<Hop>) {
        self.paths.insert((from, to), hops);
    }

    /// Number of pinned paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// No pinned paths
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Load pinned paths from a JSON file
    pub fn from_file<P: AsRef<FsPath>>(path: P) -> Result<Self, RoutingError> {
        let content = std::fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&content)?;
        let resolver = Self::try_from(&value)?;
        info!("Loaded {} static paths from {:?}", resolver.len(), path.as_ref());
        Ok(resolver)
    }
}

impl TryFrom<&Value> for StaticPathResolver {
    type Error = PathError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let entries = value.as_array().ok_or_else(|| PathError::InvalidType {
            field: "paths".to_string(),
            expected: "array",
            found: "non-array",
        })?;

        let mut resolver = Self::new();
        for (i, entry) in entries.iter().enumerate() {
            let from = endpoint(entry, "from", i)?;
            let to = endpoint(entry, "to", i)?;

            let hops = match entry.get("hops") {
                Some(Value::Array(items)) => items.iter().map(Hop::try_from).collect::<Result<Vec<_>, _>>()?,
                Some(_) => {
                    return Err(PathError::InvalidType {
                        field: format!("paths[{}].hops", i),
                        expected: "array of hops",
                        found: "non-array",
                    })
                }
                None => return Err(PathError::MissingField(format!("paths[{}].hops", i))),
            };

            resolver.insert(from, to, hops);
        }

        Ok(resolver)
    }
}

fn endpoint(entry: &Value, name: &str, index: usize) -> Result<PortKey, PathError> {
    let field = format!("paths[{}].{}", index, name);
    let value = entry
        .get(name)
        .ok_or_else(|| PathError::MissingField(field.clone()))?;

    // reuse hop parsing for the range checks
    let pair = match value.as_array().map(Vec::as_slice) {
        Some([dpid, port]) => serde_json::json!({"datapath_id": dpid, "in_port": port, "out_port": 0}),
        _ => {
            return Err(PathError::InvalidType {
                field,
                expected: "[dpid, port]",
                found: "other",
            })
        }
    };
    let hop = Hop::try_from(&pair)?;
    Ok(PortKey::new(hop.datapath_id(), hop.in_port()))
}

impl PathResolver for StaticPathResolver {
    fn resolve(
        &self,
        _topology: &SwitchDs,
        in_dpid: u64,
        in_port: u16,
        out_dpid: u64,
        out_port: u16,
    ) -> Option<Vec<Hop>> {
        self.paths
            .get(&(PortKey::new(in_dpid, in_port), PortKey::new(out_dpid, out_port)))
            .cloned()
    }
}
