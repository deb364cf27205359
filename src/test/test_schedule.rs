//! Release scheduler: hyperperiod computation and cyclic release layout (§4.2, seed suite
//! scenario 5).

use pretty_assertions::assert_eq;

use crate::schedule::build_schedule;
use crate::stream::{Stream, StreamId};
use crate::types::{DeviceId, StreamError};

fn device(n: u32) -> DeviceId {
    petgraph::graph::NodeIndex::new(n as usize)
}

#[test]
fn hyperperiod_is_the_lcm_of_periods() {
    let s1 = Stream::new("S1", device(0), device(1), 64, 10, 10, 1);
    let s2 = Stream::new("S2", device(0), device(1), 64, 15, 15, 1);

    let schedule = build_schedule(&[s1, s2]).unwrap();

    assert_eq!(schedule.hyperperiod, 30);
    assert_eq!(schedule.at(0), Some([StreamId::from("S1"), StreamId::from("S2")].as_slice()));
    assert_eq!(schedule.at(10), Some([StreamId::from("S1")].as_slice()));
    assert_eq!(schedule.at(15), Some([StreamId::from("S2")].as_slice()));
    assert_eq!(schedule.at(20), Some([StreamId::from("S1")].as_slice()));
    assert_eq!(schedule.at(5), None);
}

#[test]
fn release_count_matches_hyperperiod_over_period() {
    let s1 = Stream::new("S1", device(0), device(1), 64, 10, 10, 1);
    let s2 = Stream::new("S2", device(0), device(1), 64, 15, 15, 1);
    let schedule = build_schedule(&[s1, s2]).unwrap();

    let s1_releases = schedule
        .iter()
        .filter(|(_, ids)| ids.contains(&StreamId::from("S1")))
        .count();
    let s2_releases = schedule
        .iter()
        .filter(|(_, ids)| ids.contains(&StreamId::from("S2")))
        .count();

    assert_eq!(s1_releases as u64, schedule.hyperperiod / 10);
    assert_eq!(s2_releases as u64, schedule.hyperperiod / 15);
}

#[test]
fn schedule_is_invariant_under_stream_reordering() {
    let s1 = Stream::new("S1", device(0), device(1), 64, 10, 10, 1);
    let s2 = Stream::new("S2", device(0), device(1), 64, 15, 15, 1);

    let forward = build_schedule(&[s1.clone(), s2.clone()]).unwrap();
    let backward = build_schedule(&[s2, s1]).unwrap();

    assert_eq!(forward.hyperperiod, backward.hyperperiod);
    for (t, ids) in forward.iter() {
        assert_eq!(Some(ids), backward.at(t));
    }
}

#[test]
fn period_equal_to_hyperperiod_releases_once() {
    let s = Stream::new("S", device(0), device(1), 64, 30, 30, 1);
    let schedule = build_schedule(&[s]).unwrap();

    assert_eq!(schedule.hyperperiod, 30);
    assert_eq!(schedule.iter().count(), 1);
}

#[test]
fn zero_period_is_rejected() {
    let s = Stream::new("S", device(0), device(1), 64, 0, 10, 1);
    let err = build_schedule(&[s]).unwrap_err();
    assert_eq!(err, StreamError::NonPositivePeriod(StreamId::from("S")));
}

#[test]
fn next_after_wraps_to_the_start_of_the_hyperperiod() {
    let s1 = Stream::new("S1", device(0), device(1), 64, 10, 10, 1);
    let schedule = build_schedule(&[s1]).unwrap();

    assert_eq!(schedule.next_after(0), Some(0));
}
