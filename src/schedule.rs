//! # Release Scheduler module
//!
//! Computes the hyperperiod (LCM of periods) and the static `release_time -> set<Stream>` map
//! covering one hyperperiod (§4.2). Grounded on `bgpsim::event::BasicEventQueue`'s shape (a
//! pre-computed, replayable sequence) generalized from a single FIFO to a full periodic map.

use std::collections::BTreeMap;

use crate::stream::{Stream, StreamId};
use crate::types::StreamError;

/// `release_time_within_hyperperiod -> ids of streams released at that offset`. Entries with an
/// empty set are omitted (§4.2).
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// The least common multiple of all stream periods.
    pub hyperperiod: u64,
    releases: BTreeMap<u64, Vec<StreamId>>,
}

impl Schedule {
    /// Iterate releases in ascending time order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[StreamId])> {
        self.releases.iter().map(|(&t, ids)| (t, ids.as_slice()))
    }

    /// The streams released exactly at offset `t`, if any.
    pub fn at(&self, t: u64) -> Option<&[StreamId]> {
        self.releases.get(&t).map(|v| v.as_slice())
    }

    /// The smallest scheduled release time strictly greater than `after` (wrapping at the
    /// hyperperiod), or the smallest release time overall if none is greater.
    pub fn next_after(&self, after: u64) -> Option<u64> {
        self.releases
            .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
            .next()
            .map(|(&t, _)| t)
            .or_else(|| self.releases.keys().next().copied())
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

/// Compute the hyperperiod and release schedule for `streams`. Fails with
/// `StreamError::NonPositivePeriod` if any period is zero (§4.2).
///
/// The resulting schedule is invariant under reordering of `streams` (§8 round-trip property):
/// the map is keyed by release time, not by input order.
pub fn build_schedule(streams: &[Stream]) -> Result<Schedule, StreamError> {
    for s in streams {
        if s.period == 0 {
            return Err(StreamError::NonPositivePeriod(s.id.clone()));
        }
    }
    let hyperperiod = streams
        .iter()
        .map(|s| s.period)
        .fold(1u64, lcm);

    let mut releases: BTreeMap<u64, Vec<StreamId>> = BTreeMap::new();
    for s in streams {
        let count = hyperperiod / s.period;
        for k in 0..count {
            releases.entry(k * s.period).or_default().push(s.id.clone());
        }
    }
    for ids in releases.values_mut() {
        ids.sort();
    }

    Ok(Schedule {
        hyperperiod,
        releases,
    })
}
