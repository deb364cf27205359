//! # Router module
//!
//! For each stream, populate `stream.routes` with up to `rl` node-disjoint simple paths from
//! `src` to `dst` (§4.1). Computed as a Menger-style max-flow on a node-split graph: every
//! intermediate device is split into an `in`/`out` pair joined by a unit-capacity edge, so a unit
//! of flow can traverse a device at most once. Grounded on `bgpsim::forwarding_state`'s use of
//! `petgraph` graph algorithms for path computation, generalized here to a hand-rolled min-cost
//! flow since disjoint-path search (as opposed to shortest-path / reachability) has no direct
//! counterpart among the teacher's dependencies.

use std::collections::VecDeque;

use crate::stream::{Path, Stream};
use crate::topology::Network;
use crate::types::{DeviceId, RoutingError, StreamError};

/// A directed edge in the node-split flow graph.
#[derive(Debug, Clone, Copy)]
struct FlowEdge {
    to: usize,
    cap: i64,
    cost: f64,
    /// Index of this edge's reverse counterpart in the same `edges` vector.
    rev: usize,
}

/// A minimal successive-shortest-path min-cost-flow solver over a node-split graph, specialized
/// for unit-capacity intermediate nodes (node-disjoint path search).
struct FlowGraph {
    adj: Vec<Vec<usize>>,
    edges: Vec<FlowEdge>,
}

impl FlowGraph {
    fn new(n: usize) -> Self {
        Self {
            adj: vec![Vec::new(); n],
            edges: Vec::new(),
        }
    }

    fn add_edge(&mut self, from: usize, to: usize, cap: i64, cost: f64) {
        let fwd = self.edges.len();
        let rev = fwd + 1;
        self.edges.push(FlowEdge {
            to,
            cap,
            cost,
            rev,
        });
        self.edges.push(FlowEdge {
            to: from,
            cap: 0,
            cost: -cost,
            rev: fwd,
        });
        self.adj[from].push(fwd);
        self.adj[to].push(rev);
    }

    /// Orders each node's adjacency list by the visited node's name, so that among several
    /// equal-cost relaxations SPFA naturally discovers the lexicographically smallest one first
    /// (§4.1: "first-found wins on equal cost; secondary tie-break is lexicographic by the
    /// sequence of device names").
    fn sort_adjacency_by_name(&mut self, node_names: &[String]) {
        for list in &mut self.adj {
            list.sort_by(|&a, &b| node_names[self.edges[a].to].cmp(&node_names[self.edges[b].to]));
        }
    }

    /// Bellman-Ford shortest path (SPFA) in the residual graph from `s`. Only relaxes on a strict
    /// distance decrease: this is what makes SPFA's termination guarantee hold (a node is
    /// requeued only when its distance actually shrinks, which can happen a bounded number of
    /// times). Tie-breaking among equal-cost paths is handled by `sort_adjacency_by_name`, not
    /// here, since re-relaxing on an exact tie would let nodes be requeued indefinitely.
    fn shortest_path(&self, s: usize, t: usize) -> Option<(Vec<usize>, f64)> {
        const EPS: f64 = 1e-9;
        let n = self.adj.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut pred_edge: Vec<Option<usize>> = vec![None; n];
        let mut in_queue = vec![false; n];
        dist[s] = 0.0;
        let mut queue = VecDeque::from([s]);
        in_queue[s] = true;
        while let Some(u) = queue.pop_front() {
            in_queue[u] = false;
            for &e in &self.adj[u] {
                let edge = self.edges[e];
                if edge.cap <= 0 {
                    continue;
                }
                let nd = dist[u] + edge.cost;
                if nd < dist[edge.to] - EPS {
                    dist[edge.to] = nd;
                    pred_edge[edge.to] = Some(e);
                    if !in_queue[edge.to] {
                        queue.push_back(edge.to);
                        in_queue[edge.to] = true;
                    }
                }
            }
        }
        if dist[t].is_infinite() {
            return None;
        }
        let mut path_edges = Vec::new();
        let mut cur = t;
        while cur != s {
            let e = pred_edge[cur]?;
            path_edges.push(e);
            cur = self.edges[e ^ 1].to;
        }
        path_edges.reverse();
        Some((path_edges, dist[t]))
    }

    fn augment(&mut self, path_edges: &[usize]) {
        for &e in path_edges {
            self.edges[e].cap -= 1;
            let r = self.edges[e].rev;
            self.edges[r].cap += 1;
        }
    }
}

fn node_in(idx: usize) -> usize {
    2 * idx
}
fn node_out(idx: usize) -> usize {
    2 * idx + 1
}

/// Populate `stream.routes` with up to `stream.rl` node-disjoint simple paths from `stream.src`
/// to `stream.dst`. Returns `Err(RoutingError::NoPath)` if zero paths exist, and
/// `Err(RoutingError::InvalidStream)` for `src == dst` (§4.1 edge case).
///
/// On success, `stream.redundancy_deficient` is set if fewer than `rl` disjoint paths were found.
pub fn route(network: &Network, stream: &mut Stream) -> Result<(), RoutingError> {
    if stream.src == stream.dst {
        return Err(RoutingError::InvalidStream(
            stream.id.clone(),
            StreamError::SameEndpoint(stream.id.clone()),
        ));
    }

    let ids: Vec<DeviceId> = network.device_ids().collect();
    let index_of = |id: DeviceId| ids.iter().position(|&x| x == id).expect("known device");
    let names: Vec<String> = ids.iter().map(|&id| network.device(id).name.clone()).collect();

    // Node-split graph: 2 flow-nodes per device (in/out), plus a super source/sink.
    let n = ids.len();
    let super_source = 2 * n;
    let super_sink = 2 * n + 1;
    let mut flow = FlowGraph::new(2 * n + 2);

    let src_idx = index_of(stream.src);
    let dst_idx = index_of(stream.dst);
    let big = stream.rl as i64;

    for (idx, _) in ids.iter().enumerate() {
        let cap = if idx == src_idx || idx == dst_idx {
            big
        } else {
            1
        };
        flow.add_edge(node_in(idx), node_out(idx), cap, 0.0);
    }
    for &u in &ids {
        for (v, speed) in network.successors(u) {
            if u == v {
                // Self-loops are ignored (§4.1 edge case).
                continue;
            }
            let ui = index_of(u);
            let vi = index_of(v);
            flow.add_edge(node_out(ui), node_in(vi), 1, 1.0 / speed);
        }
    }
    flow.add_edge(super_source, node_in(src_idx), big, 0.0);
    flow.add_edge(node_out(dst_idx), super_sink, big, 0.0);

    // A flow-node sequence, decoded back to a `Path` of `DeviceId`s.
    let mut node_names: Vec<String> = Vec::with_capacity(2 * n + 2);
    node_names.extend(names.iter().flat_map(|nm| [nm.clone(), nm.clone()]));
    node_names.push(String::new());
    node_names.push(String::new());
    flow.sort_adjacency_by_name(&node_names);

    let mut routes: Vec<Path> = Vec::new();
    for _ in 0..stream.rl {
        let Some((path_edges, _cost)) = flow.shortest_path(super_source, super_sink) else {
            break;
        };
        flow.augment(&path_edges);

        // Decode: keep only the `out(i) -> in(j)` hops, which correspond to original links.
        let mut path = vec![stream.src];
        for &e in &path_edges {
            let edge = flow.edges[e];
            let from = flow.edges[edge.rev].to;
            if from % 2 == 1 && edge.to.is_multiple_of(2) && edge.to / 2 != from / 2 {
                path.push(ids[edge.to / 2]);
            }
        }
        routes.push(path);
    }

    if routes.is_empty() {
        return Err(RoutingError::NoPath(stream.id.clone()));
    }

    stream.redundancy_deficient = routes.len() < stream.rl as usize;
    stream.routes = routes;
    log::info!(
        "routed stream {}: found {}/{} disjoint paths{}",
        stream.id,
        stream.routes.len(),
        stream.rl,
        if stream.redundancy_deficient {
            " (redundancy deficient)"
        } else {
            ""
        }
    );
    Ok(())
}
