//! # Engine configuration
//!
//! A single immutable value threaded through the simulation engine, per spec.md §9's redesign
//! guidance ("Config as ambient globals: encapsulate MTU, idle quantum, scheduler choice in a
//! single immutable config value"). Grounded on `bgpsim::network::Network`'s `stop_after` /
//! `skip_queue` fields, which play the same role (engine-wide run parameters) but are scattered
//! across the `Network` struct rather than collected into one value — this module collects them.

use crate::stream::{IDLE_QUANTUM, MTU};

/// The only scheduler variant the engine recognizes (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerKind {
    /// Strict priority with EDF intra-priority tie-break.
    #[default]
    StrictPriority,
}

/// Engine-wide run parameters (§6 "Runtime configuration").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    /// Maximum framelet payload size, in bytes.
    pub mtu: u32,
    /// Idle-tick quantum applied to a device with nothing to emit.
    pub idle_quantum: f64,
    /// If > 0, stop when the current simulator time reaches this value. Otherwise run one full
    /// hyperperiod.
    pub time_limit: u64,
    /// Terminate after the first deadline miss.
    pub stop_on_miss: bool,
    /// The scheduler variant; only `StrictPriority` is supported.
    pub scheduler: SchedulerKind,
    /// Defensive upper bound on the number of engine steps, guarding against runaway loops.
    pub iteration_cap: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mtu: MTU,
            idle_quantum: IDLE_QUANTUM,
            time_limit: 0,
            stop_on_miss: false,
            scheduler: SchedulerKind::default(),
            iteration_cap: 10_000_000,
        }
    }
}
