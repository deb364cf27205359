//! # Topology module
//!
//! Devices (end systems, switches) as graph nodes; directed links carrying a line rate. Grounded
//! on `bgpsim::network::Network`'s split between a pure-topology `petgraph` graph (`IgpNetwork`,
//! nodes `()`) and a side table of device records (`HashMap<RouterId, Router<P>>`) — this is
//! exactly the "tagged variant with a shared device record" shape spec.md §9 asks for, so the
//! device-step code in [`crate::engine`] can switch on `DeviceKind` without virtual dispatch.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::Directed;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

use crate::stream::Framelet;
use crate::types::{DeviceId, EgressKey, IndexType, LinkWeight, SimTime, TopologyError};

/// Whether a device may originate/terminate streams (`EndSystem`) or only forwards (`Switch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// May originate and terminate streams.
    EndSystem,
    /// Forwards only.
    Switch,
}

/// A directed link `(src, dst)` carrying a line rate. At most one edge per ordered pair; speed is
/// strictly positive (enforced at construction).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    /// Line rate in bytes per simulated time unit.
    pub speed: LinkWeight,
}

/// The directed, multigraph-free topology graph. Edge weights carry [`Link`]; nodes carry no
/// payload (device state lives in [`Network::devices`], keyed by the same [`DeviceId`]).
pub type DeviceGraph = StableGraph<(), Link, Directed, IndexType>;

/// A device: an `EndSystem` or `Switch`, identified by name. Owns an ordered ingress buffer and a
/// priority-ordered egress queue of framelets, plus `local_time`.
///
/// Identity is the name: equality and hashing go by name (§3 invariant), not by queue contents.
pub struct Device {
    /// Unique device name.
    pub name: String,
    /// `EndSystem` or `Switch`.
    pub kind: DeviceKind,
    /// Simulated time at which this device next becomes free to emit.
    pub local_time: SimTime,
    /// FIFO ingress buffer, drained by the receive barrier (§4.3 step 4).
    pub ingress: VecDeque<Framelet>,
    /// Ordered by `EgressKey` (min-first via `Reverse`); the framelet payloads live in
    /// `egress_store`, keyed the same way, since `Framelet` itself (holding an `Rc` and a route)
    /// has no natural `Hash`/`Eq`.
    egress: PriorityQueue<EgressKey, Reverse<EgressKey>>,
    egress_store: HashMap<EgressKey, Framelet>,
    next_insertion_seq: u64,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Device {}
impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("local_time", &self.local_time)
            .field("ingress_len", &self.ingress.len())
            .field("egress_len", &self.egress.len())
            .finish()
    }
}

impl Device {
    fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            local_time: 0.0,
            ingress: VecDeque::new(),
            egress: PriorityQueue::new(),
            egress_store: HashMap::new(),
            next_insertion_seq: 0,
        }
    }

    /// Enqueue a framelet on this device's egress, assigning it the next insertion sequence
    /// number (the final EDF/priority tie-break, §4.3).
    pub fn enqueue_egress(&mut self, mut framelet: Framelet) {
        framelet.insertion_seq = self.next_insertion_seq;
        self.next_insertion_seq += 1;
        let key = EgressKey {
            neg_priority: -framelet.instance.priority,
            local_deadline: ordered_float::NotNan::new(framelet.instance.local_deadline)
                .unwrap_or(ordered_float::NotNan::new(0.0).unwrap()),
            insertion_seq: framelet.insertion_seq,
        };
        self.egress.push(key, Reverse(key));
        self.egress_store.insert(key, framelet);
    }

    /// Pop the highest-priority framelet: strict priority, EDF tie-break, insertion-order
    /// tie-break (§4.3).
    pub fn pop_egress(&mut self) -> Option<Framelet> {
        let (key, _) = self.egress.pop()?;
        self.egress_store.remove(&key)
    }

    /// Whether the egress queue is empty.
    pub fn egress_is_empty(&self) -> bool {
        self.egress.is_empty()
    }

    /// Drain the ingress buffer in arrival order (FIFO).
    pub fn drain_ingress(&mut self) -> Vec<Framelet> {
        self.ingress.drain(..).collect()
    }
}

/// The network: devices and links. Owns all devices; routes reference devices by [`DeviceId`]
/// only, never by owning pointer (spec.md §9 "cyclic references").
#[derive(Default)]
pub struct Network {
    graph: DeviceGraph,
    devices: HashMap<DeviceId, Device>,
    names: HashMap<String, DeviceId>,
}

impl Network {
    /// Construct an empty network.
    pub fn new() -> Self {
        Self {
            graph: DeviceGraph::default(),
            devices: HashMap::new(),
            names: HashMap::new(),
        }
    }

    fn add_device(
        &mut self,
        name: impl Into<String>,
        kind: DeviceKind,
    ) -> Result<DeviceId, TopologyError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(TopologyError::DuplicateDevice(name));
        }
        let id = self.graph.add_node(());
        self.names.insert(name.clone(), id);
        self.devices.insert(id, Device::new(name, kind));
        Ok(id)
    }

    /// Add a new `EndSystem`, returning its [`DeviceId`].
    pub fn add_end_system(&mut self, name: impl Into<String>) -> Result<DeviceId, TopologyError> {
        self.add_device(name, DeviceKind::EndSystem)
    }

    /// Add a new `Switch`, returning its [`DeviceId`].
    pub fn add_switch(&mut self, name: impl Into<String>) -> Result<DeviceId, TopologyError> {
        self.add_device(name, DeviceKind::Switch)
    }

    /// Add a directed link `src -> dst` with the given `speed`. At most one edge per ordered
    /// pair (re-adding with a different speed updates it); speed must be strictly positive.
    pub fn add_link(
        &mut self,
        src: DeviceId,
        dst: DeviceId,
        speed: LinkWeight,
    ) -> Result<(), TopologyError> {
        let src_name = self.device_name(src)?;
        let dst_name = self.device_name(dst)?;
        if speed <= 0.0 {
            return Err(TopologyError::NonPositiveSpeed(src_name, dst_name));
        }
        if let Some(edge) = self.graph.find_edge(src, dst) {
            self.graph[edge] = Link { speed };
        } else {
            self.graph.add_edge(src, dst, Link { speed });
        }
        Ok(())
    }

    fn device_name(&self, id: DeviceId) -> Result<String, TopologyError> {
        self.devices
            .get(&id)
            .map(|d| d.name.clone())
            .ok_or_else(|| TopologyError::UnknownDevice(format!("{id:?}")))
    }

    /// Look up a device by name.
    pub fn get_device_id(&self, name: impl AsRef<str>) -> Result<DeviceId, TopologyError> {
        self.names
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| TopologyError::UnknownDevice(name.as_ref().to_string()))
    }

    /// Immutable access to a device record.
    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[&id]
    }

    /// Mutable access to a device record.
    pub fn device_mut(&mut self, id: DeviceId) -> &mut Device {
        self.devices.get_mut(&id).expect("known DeviceId")
    }

    /// All device ids, in graph insertion order.
    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    /// The underlying topology graph (for use by the router's path-search algorithms).
    pub fn graph(&self) -> &DeviceGraph {
        &self.graph
    }

    /// The speed of the link `src -> dst`, if it exists.
    pub fn link_speed(&self, src: DeviceId, dst: DeviceId) -> Option<LinkWeight> {
        self.graph
            .find_edge(src, dst)
            .map(|e| self.graph[e].speed)
    }

    /// Out-edges of `id`, as `(neighbor, speed)` pairs.
    pub fn successors(&self, id: DeviceId) -> impl Iterator<Item = (DeviceId, LinkWeight)> + '_ {
        self.graph
            .edges(id)
            .map(|e| (e.target(), e.weight().speed))
    }

    /// In+out degree of `id` (used by the topology cost model, §4.4).
    pub fn degree(&self, id: DeviceId) -> usize {
        self.graph
            .edges(id)
            .count()
            .saturating_add(
                self.graph
                    .edges_directed(id, petgraph::Direction::Incoming)
                    .count(),
            )
    }

    /// All switch device ids.
    pub fn switches(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices
            .iter()
            .filter(|(_, d)| d.kind == DeviceKind::Switch)
            .map(|(&id, _)| id)
    }

    /// Validate that `src`/`dst` are both `EndSystem`s and distinct.
    pub fn validate_stream_endpoints(
        &self,
        src: DeviceId,
        dst: DeviceId,
    ) -> Result<(), TopologyError> {
        for id in [src, dst] {
            match self.devices.get(&id) {
                Some(d) if d.kind == DeviceKind::EndSystem => {}
                Some(d) => {
                    return Err(TopologyError::UnknownDevice(format!(
                        "{} is not an EndSystem",
                        d.name
                    )))
                }
                None => return Err(TopologyError::UnknownDevice(format!("{id:?}"))),
            }
        }
        Ok(())
    }

    /// Whether two device ids are reachable from one another in the directed graph (used to
    /// validate the §3 Network invariant before routing).
    pub fn reachable(&self, src: DeviceId, dst: DeviceId) -> bool {
        let mut seen: HashSet<DeviceId> = HashSet::new();
        let mut queue = VecDeque::from([src]);
        seen.insert(src);
        while let Some(cur) = queue.pop_front() {
            if cur == dst {
                return true;
            }
            for (next, _) in self.successors(cur) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }
}
