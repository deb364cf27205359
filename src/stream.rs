//! Module containing periodic streams, their per-release instances, and framelets.
//!
//! Grounded on `bgpsim::types::AsId` for the identifier-newtype shape, and on
//! `examples/original_source/src/logic.py`'s `Stream`/`StreamInstance`/`Framelet` dataclasses for
//! the field layout and lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, LinkWeight, SimTime};

/// Build-time MTU: the maximum payload size of a single framelet, in bytes.
pub const MTU: u32 = 64;
/// Idle-tick quantum applied to a device with nothing to emit: `MTU / 12.5` time units.
pub const IDLE_QUANTUM: SimTime = MTU as f64 / 12.5;

/// Stream identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(pub String);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A simple path through the network: an ordered sequence of devices from `src` to `dst`.
pub type Path = Vec<DeviceId>;

/// A directed link identifier, used by the Accounting module's redundancy check (§4.4).
pub type RouteLink = (DeviceId, DeviceId);

/// Turn a path (sequence of devices) into its ordered sequence of directed links.
pub fn path_links(path: &[DeviceId]) -> Vec<RouteLink> {
    path.windows(2).map(|w| (w[0], w[1])).collect()
}

/// A periodic stream: `{ id, src, dst, size, period, deadline, rl, routes }` (§3).
///
/// Mutated only during routing setup; read-only during simulation. Per the redesign guidance in
/// spec.md §9 ("Global mutable WCTT on Stream"), WCTT itself is *not* a field here — it lives in
/// [`crate::accounting::Results`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    /// Stream identifier.
    pub id: StreamId,
    /// Source end system.
    pub src: DeviceId,
    /// Destination end system.
    pub dst: DeviceId,
    /// Total payload bytes per release.
    pub size: u32,
    /// Release period, in simulated time units.
    pub period: u64,
    /// Relative deadline, in simulated time units.
    pub deadline: u64,
    /// Required redundancy level (number of disjoint routes requested).
    pub rl: u32,
    /// Strict-priority class. Defaults to 1 if the source input leaves it unset (§4.3).
    pub priority: i64,
    /// Up to `rl` link-disjoint paths, populated by the router. Non-empty once routed.
    pub routes: Vec<Path>,
    /// Set by the router when fewer than `rl` disjoint paths were found.
    pub redundancy_deficient: bool,
}

impl Stream {
    /// Construct a new, unrouted stream with default priority 1.
    pub fn new(
        id: impl Into<StreamId>,
        src: DeviceId,
        dst: DeviceId,
        size: u32,
        period: u64,
        deadline: u64,
        rl: u32,
    ) -> Self {
        Self {
            id: id.into(),
            src,
            dst,
            size,
            period,
            deadline,
            rl,
            priority: 1,
            routes: Vec::new(),
            redundancy_deficient: false,
        }
    }

    /// Set the strict-priority class (builder-style, mirrors the fluent setters on `bgpsim`'s
    /// `Router`).
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// One release of a [`Stream`].
#[derive(Debug, Clone)]
pub struct StreamInstance {
    /// Identifies the owning stream without an owning pointer (spec.md §9 "cyclic references").
    pub stream_id: StreamId,
    /// Strict-priority class, copied from the stream at release time.
    pub priority: i64,
    /// The absolute time this instance was released.
    pub release_time: SimTime,
    /// `release_time + stream.deadline`.
    pub local_deadline: SimTime,
    /// Number of routes this instance was fragmented onto (one framelet chain per route).
    pub num_routes: usize,
    /// Number of framelets in each route's chain (identical across routes, since every route
    /// carries the full payload).
    pub framelets_per_route: u32,
}

/// One MTU-sized fragment of a stream release, bound to one of the stream's routes.
#[derive(Debug, Clone)]
pub struct Framelet {
    /// Index of the framelet within its route's chain, ascending from 0.
    pub index: u32,
    /// The instance this framelet belongs to (referenced by value, not by pointer; see
    /// [`StreamInstance`]).
    pub instance: std::rc::Rc<StreamInstance>,
    /// Size of this fragment in bytes; `<= MTU`.
    pub size: u32,
    /// Which of the stream's routes (by index into `Stream::routes`) this framelet travels.
    pub route_index: usize,
    /// The route itself, so the engine can look up the next hop without re-indexing the stream.
    pub route: Path,
    /// The earliest simulated time at which this framelet becomes available at the current hop's
    /// input. Stamped by the engine on every hop.
    pub current_time: SimTime,
    /// Monotonically increasing per-device counter, used as the final egress tie-break.
    pub insertion_seq: u64,
}

impl Framelet {
    /// The hop index of `device` within this framelet's route, if present.
    pub fn position_in_route(&self, device: DeviceId) -> Option<usize> {
        self.route.iter().position(|&d| d == device)
    }

    /// Whether `device` is the final hop of this framelet's route.
    pub fn is_final_hop(&self, device: DeviceId) -> bool {
        self.route.last() == Some(&device)
    }
}

/// Fragment `size` total bytes into framelets of at most `mtu` bytes each.
///
/// Invariant preserved: the sum of returned sizes equals `size` exactly (§3).
fn fragment_sizes(size: u32, mtu: u32) -> Vec<u32> {
    if size == 0 {
        return Vec::new();
    }
    let mut remaining = size;
    let mut sizes = Vec::new();
    while remaining > 0 {
        let chunk = remaining.min(mtu);
        sizes.push(chunk);
        remaining -= chunk;
    }
    sizes
}

/// Materialize one [`StreamInstance`] of `stream`, releasing at `release_time`, producing one
/// framelet chain per route (redundancy semantics, §3: "a stream with `rl` routes produces `rl`
/// independent framelet chains per release").
///
/// Returns the instance together with, for each route, its ordered chain of framelets (ascending
/// `index`), so the caller can enqueue each chain on the source's egress in order. Egress
/// enqueueing assigns the real `insertion_seq` (per-device), so the placeholder `0` here is
/// overwritten by [`crate::topology::Device::enqueue_egress`].
pub fn release_instance(
    stream: &Stream,
    release_time: SimTime,
    mtu: u32,
) -> (std::rc::Rc<StreamInstance>, Vec<Vec<Framelet>>) {
    let sizes = fragment_sizes(stream.size, mtu);
    let instance = std::rc::Rc::new(StreamInstance {
        stream_id: stream.id.clone(),
        priority: stream.priority,
        release_time,
        local_deadline: release_time + stream.deadline as f64,
        num_routes: stream.routes.len(),
        framelets_per_route: sizes.len() as u32,
    });

    let chains = stream
        .routes
        .iter()
        .enumerate()
        .map(|(route_index, route)| {
            sizes
                .iter()
                .enumerate()
                .map(|(index, &size)| Framelet {
                    index: index as u32,
                    instance: instance.clone(),
                    size,
                    route_index,
                    route: route.clone(),
                    current_time: release_time,
                    insertion_seq: 0,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    (instance, chains)
}

/// Serialization delay of a framelet of `size` bytes on a link running at `speed` bytes per time
/// unit.
pub fn serialization_delay(size: u32, speed: LinkWeight) -> SimTime {
    size as f64 / speed
}
