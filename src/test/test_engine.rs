//! End-to-end engine runs (§4.3, seed suite scenarios 1, 2, 3, 4).

use pretty_assertions::assert_eq;

use crate::config::SimConfig;
use crate::engine::{Engine, StopReason};
use crate::stream::Stream;
use crate::topology::Network;

#[test_log::test]
fn two_device_one_link_meets_its_deadline() {
    let mut net = Network::new();
    let es1 = net.add_end_system("ES1").unwrap();
    let es2 = net.add_end_system("ES2").unwrap();
    net.add_link(es1, es2, 125.0).unwrap();

    let stream = Stream::new("S", es1, es2, 125, 1000, 1000, 1);
    let mut engine = Engine::new(net, vec![stream], SimConfig::default()).unwrap();

    let reason = engine.run().unwrap();

    assert_eq!(reason, StopReason::HyperperiodExhausted);
    assert!(!engine.results().deadlines_missed());
    assert_eq!(engine.results().wctt(&"S".into()), 1.0);
}

#[test_log::test]
fn diamond_topology_delivers_over_two_disjoint_routes() {
    let mut net = Network::new();
    let es1 = net.add_end_system("ES1").unwrap();
    let sw1 = net.add_switch("SW1").unwrap();
    let sw2 = net.add_switch("SW2").unwrap();
    let es2 = net.add_end_system("ES2").unwrap();
    net.add_link(es1, sw1, 125.0).unwrap();
    net.add_link(es1, sw2, 125.0).unwrap();
    net.add_link(sw1, es2, 125.0).unwrap();
    net.add_link(sw2, es2, 125.0).unwrap();

    let stream = Stream::new("S", es1, es2, 125, 1000, 1000, 2);
    let mut engine = Engine::new(net, vec![stream], SimConfig::default()).unwrap();
    engine.run().unwrap();

    assert_eq!(engine.streams()[&"S".into()].routes.len(), 2);
    assert_eq!(engine.results().redundancy_ok[&"S".into()], true);
    // Both 125-byte chains fragment into a 64B + 61B framelet pair over 125-byte/time-unit
    // links; ES1's egress FIFO emits route 0's pair first (0.512 + 0.488 = 1.0), and since every
    // index's fastest arrival (across both disjoint routes) is what completes the instance, the
    // redundant route never gets a chance to be the bottleneck here.
    assert_eq!(engine.results().wctt(&"S".into()), 1.0);
    assert!(!engine.results().deadlines_missed());
}

#[test_log::test]
fn overloaded_link_misses_its_deadline_and_stops() {
    let mut net = Network::new();
    let es1 = net.add_end_system("ES1").unwrap();
    let sw = net.add_switch("SW").unwrap();
    let es2 = net.add_end_system("ES2").unwrap();
    net.add_link(es1, sw, 10.0).unwrap();
    net.add_link(sw, es2, 125.0).unwrap();

    // The 10 bytes/time-unit link alone takes 100 time units to drain 1000 bytes, so the stream
    // cannot possibly meet a 50-unit deadline; give it a period long enough that the miss is
    // actually observed (delivery completes) before the run stops at the hyperperiod boundary.
    let stream = Stream::new("S", es1, es2, 1000, 150, 50, 1);
    let config = SimConfig {
        stop_on_miss: true,
        ..SimConfig::default()
    };
    let mut engine = Engine::new(net, vec![stream], config).unwrap();

    let reason = engine.run().unwrap();

    assert_eq!(reason, StopReason::StopOnMiss);
    assert!(engine.results().deadlines_missed());
}

#[test_log::test]
fn higher_priority_stream_is_transmitted_first() {
    let mut net = Network::new();
    let es1 = net.add_end_system("ES1").unwrap();
    let es2 = net.add_end_system("ES2").unwrap();
    net.add_link(es1, es2, 125.0).unwrap();

    let hi = Stream::new("HI", es1, es2, 64, 1000, 1000, 1).with_priority(8);
    let lo = Stream::new("LO", es1, es2, 64, 1000, 1000, 1).with_priority(1);
    let mut engine = Engine::new(net, vec![hi, lo], SimConfig::default()).unwrap();
    engine.run().unwrap();

    assert!(!engine.results().deadlines_missed());
    assert!(engine.results().wctt(&"HI".into()) < engine.results().wctt(&"LO".into()));
}

#[test_log::test]
fn simulating_the_same_inputs_twice_is_deterministic() {
    let build = || {
        let mut net = Network::new();
        let es1 = net.add_end_system("ES1").unwrap();
        let sw1 = net.add_switch("SW1").unwrap();
        let sw2 = net.add_switch("SW2").unwrap();
        let es2 = net.add_end_system("ES2").unwrap();
        net.add_link(es1, sw1, 125.0).unwrap();
        net.add_link(es1, sw2, 125.0).unwrap();
        net.add_link(sw1, es2, 125.0).unwrap();
        net.add_link(sw2, es2, 125.0).unwrap();
        let stream = Stream::new("S", es1, es2, 125, 1000, 1000, 2);
        (net, vec![stream])
    };

    let (net_a, streams_a) = build();
    let (net_b, streams_b) = build();
    let mut engine_a = Engine::new(net_a, streams_a, SimConfig::default()).unwrap();
    let mut engine_b = Engine::new(net_b, streams_b, SimConfig::default()).unwrap();

    let reason_a = engine_a.run().unwrap();
    let reason_b = engine_b.run().unwrap();

    assert_eq!(reason_a, reason_b);
    assert_eq!(
        engine_a.results().wctt(&"S".into()),
        engine_b.results().wctt(&"S".into())
    );
    assert_eq!(
        engine_a.results().total_misses(),
        engine_b.results().total_misses()
    );
}

#[test_log::test]
fn a_late_redundant_duplicate_does_not_record_a_spurious_miss() {
    let mut net = Network::new();
    let es1 = net.add_end_system("ES1").unwrap();
    let sw1 = net.add_switch("SW1").unwrap();
    let sw2 = net.add_switch("SW2").unwrap();
    let es2 = net.add_end_system("ES2").unwrap();
    net.add_link(es1, sw1, 125.0).unwrap();
    net.add_link(sw1, es2, 125.0).unwrap();
    // A disjoint but much slower second route: its copy of every framelet always arrives after
    // the fast route's, so it must never re-open an instance that already delivered on time.
    net.add_link(es1, sw2, 5.0).unwrap();
    net.add_link(sw2, es2, 5.0).unwrap();

    let stream = Stream::new("S", es1, es2, 64, 1000, 1000, 2);
    let config = SimConfig {
        stop_on_miss: true,
        ..SimConfig::default()
    };
    let mut engine = Engine::new(net, vec![stream], config).unwrap();

    let reason = engine.run().unwrap();

    assert_eq!(reason, StopReason::HyperperiodExhausted);
    assert!(!engine.results().deadlines_missed());
    assert_eq!(engine.results().total_misses(), 0);
}

#[test_log::test]
fn redundancy_deficient_stream_still_simulates() {
    let mut net = Network::new();
    let es1 = net.add_end_system("ES1").unwrap();
    let es2 = net.add_end_system("ES2").unwrap();
    net.add_link(es1, es2, 125.0).unwrap();

    // Only one path exists, but rl=3 is requested.
    let stream = Stream::new("S", es1, es2, 125, 1000, 1000, 3);
    let mut engine = Engine::new(net, vec![stream], SimConfig::default()).unwrap();
    engine.run().unwrap();

    assert!(engine.streams()[&"S".into()].redundancy_deficient);
    assert_eq!(engine.streams()[&"S".into()].routes.len(), 1);
    assert!(!engine.results().deadlines_missed());
}
