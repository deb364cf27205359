//! # tsnsim
//!
//! A discrete-event simulator for time-sensitive, packet-switched networks (in-vehicle Ethernet /
//! TSN style): strict-priority, EDF-tie-broken forwarding of periodic streams over node-disjoint
//! redundant routes, with per-stream worst-case transmission time (WCTT) and deadline-miss
//! accounting.
//!
//! ## Main concepts
//!
//! A [`topology::Network`] holds devices ([`topology::DeviceKind::EndSystem`] or
//! [`topology::DeviceKind::Switch`]) on a directed [`petgraph`] graph of rate-carrying links. A
//! [`stream::Stream`] describes one periodic flow between two end systems; [`router::route`]
//! computes its redundant, node-disjoint paths, and [`schedule::build_schedule`] lays out its
//! releases across one hyperperiod. [`engine::Engine`] then drives the simulation to completion,
//! and [`accounting::Results`] accumulates WCTT, deadline misses, redundancy satisfaction, and
//! topology cost along the way.
//!
//! The top-level [`simulate`] function wires these together for the common case: build a network
//! and a list of streams, then run until a time limit (or the first deadline miss) is reached.
//!
//! This library was built around the same design the `bgpsim` crate uses for network simulation —
//! a `petgraph`-backed topology paired with a side table of per-device state, and a single
//! priority-queue-driven event loop — generalized here from BGP convergence to framelet-level TSN
//! forwarding.

#![deny(missing_docs)]

pub mod accounting;
pub mod config;
pub mod engine;
pub mod router;
pub mod schedule;
pub mod stream;
pub mod topology;
pub mod types;

#[cfg(test)]
mod test;

pub use accounting::Results;
pub use config::SimConfig;
pub use engine::{Engine, StopReason};
pub use stream::Stream;
pub use topology::Network;
pub use types::SimError;

/// Route every stream, build the release schedule, and run the engine to completion (§1, §6).
///
/// This is the library's single entry point for the common case: callers who need to step the
/// engine manually, or inspect [`accounting::Results`] mid-run, should construct an
/// [`engine::Engine`] directly instead.
pub fn simulate(
    network: Network,
    streams: Vec<Stream>,
    config: SimConfig,
) -> Result<(Results, StopReason), SimError> {
    let mut engine = Engine::new(network, streams, config)?;
    let reason = engine.run()?;
    Ok((engine.results().clone(), reason))
}
