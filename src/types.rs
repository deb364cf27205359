//! Module containing all type definitions shared across the crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stream::StreamId;

pub(crate) type IndexType = u32;
/// Device identification (and index into the topology graph).
pub type DeviceId = petgraph::graph::NodeIndex<IndexType>;
/// Link speed, expressed in bytes per simulated time unit.
pub type LinkWeight = f64;
/// Simulated time, in the same units as `period`/`deadline`/`speed` (microseconds in the source).
pub type SimTime = f64;

/// Errors describing a malformed topology (§7 `InvalidTopology`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Two devices were added with the same name.
    #[error("duplicate device name: {0}")]
    DuplicateDevice(String),
    /// A link or stream referenced a device name that does not exist.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    /// A link was given a speed that is not strictly positive.
    #[error("link {0} -> {1} has non-positive speed")]
    NonPositiveSpeed(String, String),
    /// A stream's source or destination is not reachable from/to an `EndSystem`.
    #[error("stream {stream} references dangling endpoint {device}")]
    DanglingStreamEndpoint {
        /// The offending stream.
        stream: StreamId,
        /// The device name that is not a reachable `EndSystem`.
        device: String,
    },
}

/// Errors describing a malformed stream (§7 `InvalidStream`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// `period` was not strictly positive.
    #[error("stream {0} has non-positive period")]
    NonPositivePeriod(StreamId),
    /// `size` was not strictly positive.
    #[error("stream {0} has non-positive size")]
    NonPositiveSize(StreamId),
    /// `deadline` was not strictly positive.
    #[error("stream {0} has non-positive deadline")]
    NonPositiveDeadline(StreamId),
    /// `rl` was zero.
    #[error("stream {0} has redundancy level zero")]
    ZeroRedundancy(StreamId),
    /// `src == dst`.
    #[error("stream {0} has identical source and destination")]
    SameEndpoint(StreamId),
}

/// Errors raised by the router (§4.1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No path at all exists between the stream's source and destination.
    #[error("no path exists for stream {0}")]
    NoPath(StreamId),
    /// The stream is structurally invalid for routing purposes (forwarded from `StreamError`).
    #[error("stream {0} is invalid for routing: {1}")]
    InvalidStream(StreamId, StreamError),
}

/// Top-level error produced by any fallible entry point of the engine.
///
/// `RedundancyDeficient` and `SimulationLimit` from spec.md §7 are deliberately absent here: both
/// are non-fatal outcomes, surfaced through [`crate::accounting::Results`] and
/// [`crate::engine::StopReason`] respectively, never returned as an `Err`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// The topology is malformed.
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),
    /// A stream is malformed.
    #[error("invalid stream: {0}")]
    Stream(#[from] StreamError),
    /// Routing failed outright.
    #[error("routing failed: {0}")]
    Routing(#[from] RoutingError),
    /// An internal invariant was violated; this indicates a bug in the engine, not bad input.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Strict-priority egress ordering key: `(-priority, local_deadline, insertion_seq)`.
///
/// Lower `priority` numbers are "better" in the `Ord` sense produced here only after negation is
/// applied by the caller; see [`crate::topology::Device::egress`] for how this is used with a
/// min-first wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EgressKey {
    /// Negated priority: a *higher* stream priority sorts first.
    pub neg_priority: i64,
    /// Earliest local deadline first (EDF tie-break).
    pub local_deadline: ordered_float::NotNan<f64>,
    /// Monotonically increasing per-device counter; breaks all remaining ties by arrival order.
    pub insertion_seq: u64,
}
