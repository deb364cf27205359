//! Accounting: redundancy check and topology cost (§4.4, seed suite scenario 6).

use pretty_assertions::assert_eq;

use crate::accounting::{redundancy_check, topology_cost};
use crate::stream::Stream;
use crate::topology::Network;
use crate::types::DeviceId;

fn device(n: u32) -> DeviceId {
    petgraph::graph::NodeIndex::new(n as usize)
}

#[test]
fn redundancy_check_passes_when_routes_are_link_disjoint() {
    let mut stream = Stream::new("S", device(0), device(3), 64, 100, 100, 2);
    stream.routes = vec![
        vec![device(0), device(1), device(3)],
        vec![device(0), device(2), device(3)],
    ];
    assert!(redundancy_check(&stream));
}

#[test]
fn redundancy_check_fails_when_a_single_link_is_shared_by_every_route() {
    // Three routes all cross the X -> Y link; removing it severs every one of them.
    let (src, x, y) = (device(0), device(1), device(2));
    let (d1, d2, d3) = (device(3), device(4), device(5));
    let mut stream = Stream::new("S", src, d1, 64, 100, 100, 2);
    stream.routes = vec![
        vec![src, x, y, d1],
        vec![src, x, y, d2],
        vec![src, x, y, d3],
    ];

    assert!(!redundancy_check(&stream));
}

#[test]
fn redundancy_check_is_trivially_true_when_rl_is_one() {
    let mut stream = Stream::new("S", device(0), device(1), 64, 100, 100, 1);
    stream.routes = vec![vec![device(0), device(1)]];
    assert!(redundancy_check(&stream));
}

#[test]
fn topology_cost_uses_the_degree_table() {
    let mut net = Network::new();
    let a = net.add_end_system("A").unwrap();
    let sw = net.add_switch("SW").unwrap();
    let b = net.add_end_system("B").unwrap();
    let c = net.add_end_system("C").unwrap();
    net.add_link(a, sw, 10.0).unwrap();
    net.add_link(sw, b, 10.0).unwrap();
    net.add_link(sw, c, 10.0).unwrap();

    // SW has degree 3 (one in, two out) -> cost table value 3.
    assert_eq!(topology_cost(&net), 3);
}
