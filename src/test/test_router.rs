//! Router: node-disjoint path search (§4.1, seed suite scenario 2).

use pretty_assertions::assert_eq;

use crate::router::route;
use crate::stream::{path_links, Stream};
use crate::topology::Network;
use crate::types::{RoutingError, StreamError};

fn diamond() -> (Network, crate::types::DeviceId, crate::types::DeviceId) {
    let mut net = Network::new();
    let es1 = net.add_end_system("ES1").unwrap();
    let sw1 = net.add_switch("SW1").unwrap();
    let sw2 = net.add_switch("SW2").unwrap();
    let es2 = net.add_end_system("ES2").unwrap();
    net.add_link(es1, sw1, 125.0).unwrap();
    net.add_link(es1, sw2, 125.0).unwrap();
    net.add_link(sw1, es2, 125.0).unwrap();
    net.add_link(sw2, es2, 125.0).unwrap();
    (net, es1, es2)
}

#[test]
fn diamond_topology_finds_two_disjoint_routes() {
    let (net, es1, es2) = diamond();
    let mut stream = Stream::new("S", es1, es2, 125, 1000, 1000, 2);

    route(&net, &mut stream).unwrap();

    assert_eq!(stream.routes.len(), 2);
    assert!(!stream.redundancy_deficient);
    let links_a = path_links(&stream.routes[0]);
    let links_b = path_links(&stream.routes[1]);
    assert!(links_a.iter().all(|l| !links_b.contains(l)));
}

#[test]
fn insufficient_disjoint_paths_flags_redundancy_deficient() {
    let (net, es1, es2) = diamond();
    let mut stream = Stream::new("S", es1, es2, 125, 1000, 1000, 3);

    route(&net, &mut stream).unwrap();

    assert_eq!(stream.routes.len(), 2);
    assert!(stream.redundancy_deficient);
}

#[test]
fn no_path_between_disconnected_devices_is_an_error() {
    let mut net = Network::new();
    let a = net.add_end_system("A").unwrap();
    let b = net.add_end_system("B").unwrap();
    let mut stream = Stream::new("S", a, b, 64, 100, 100, 1);

    let err = route(&net, &mut stream).unwrap_err();
    assert_eq!(err, RoutingError::NoPath(stream.id.clone()));
}

#[test]
fn same_endpoint_is_rejected() {
    let mut net = Network::new();
    let a = net.add_end_system("A").unwrap();
    let mut stream = Stream::new("S", a, a, 64, 100, 100, 1);

    let err = route(&net, &mut stream).unwrap_err();
    assert_eq!(
        err,
        RoutingError::InvalidStream(stream.id.clone(), StreamError::SameEndpoint(stream.id.clone()))
    );
}
