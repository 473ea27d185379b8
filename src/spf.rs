use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::NodeId;
use crate::model::state::LinkStateDb;

const EPS: f64 = 1e-9;

pub type Graph = BTreeMap<NodeId, BTreeMap<NodeId, u32>>;

/// Min-priority queue over tentative distances, ordered so a `BinaryHeap`
/// (itself a max-heap) pops the smallest cost first, with lexicographically
/// smaller node IDs breaking ties deterministically.
#[derive(Debug, Default)]
struct DistanceFrontier {
    heap: std::collections::BinaryHeap<HeapEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct HeapEntry {
    node: NodeId,
    cost: f64,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl DistanceFrontier {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: NodeId, cost: f64) {
        self.heap.push(HeapEntry { node, cost });
    }

    fn pop_min<F>(&mut self, mut is_stale: F) -> Option<(NodeId, f64)>
    where
        F: FnMut(&NodeId, f64) -> bool,
    {
        while let Some(entry) = self.heap.pop() {
            if is_stale(&entry.node, entry.cost) {
                continue;
            }
            return Some((entry.node, entry.cost));
        }
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShortestPaths {
    pub dist: BTreeMap<NodeId, f64>,
    pub first_hop: BTreeMap<NodeId, NodeId>,
}

/// Builds the SPF graph from the LSDB, applying the bidirectional-edge
/// confirmation rule: an edge between two nodes that have each originated an
/// LSA is only kept if both list each other. Edges into a node that has
/// never originated its own LSA (a host stub) are always accepted, since
/// such leaves never get the chance to "list back".
pub fn build_graph(lsdb: &LinkStateDb) -> Graph {
    let originators: BTreeSet<&NodeId> = lsdb.records().map(|r| &r.originator).collect();
    let mut graph: Graph = Graph::new();

    for record in lsdb.records() {
        let entry = graph.entry(record.originator.clone()).or_default();
        for (neighbor, cost) in &record.links {
            let neighbor_is_router = originators.contains(neighbor);
            if neighbor_is_router {
                let confirmed = lsdb
                    .get(neighbor)
                    .map(|back| back.links.contains_key(&record.originator))
                    .unwrap_or(false);
                if !confirmed {
                    continue;
                }
            }
            entry.insert(neighbor.clone(), *cost);
        }
    }
    graph
}

/// Standard non-negative-weight shortest path from `src`, breaking ties by
/// lexicographically smaller first-hop neighbor so independently converged
/// routers derive identical forwarding tables from identical LSDBs.
pub fn compute_shortest_paths(graph: &Graph, src: &NodeId) -> ShortestPaths {
    let mut dist: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut first_hop: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut settled: BTreeSet<NodeId> = BTreeSet::new();
    let mut frontier = DistanceFrontier::new();

    dist.insert(src.clone(), 0.0);
    frontier.push(src.clone(), 0.0);

    loop {
        let Some((u, cost_u)) = frontier.pop_min(|node, cost| {
            if settled.contains(node) {
                return true;
            }
            match dist.get(node).copied() {
                Some(best) => cost > best + EPS,
                None => true,
            }
        }) else {
            break;
        };
        settled.insert(u.clone());

        let Some(neighbors) = graph.get(&u) else {
            continue;
        };
        for (v, edge_cost) in neighbors {
            let candidate_metric = cost_u + f64::from(*edge_cost);
            let candidate_hop = if u == *src {
                v.clone()
            } else {
                first_hop.get(&u).cloned().unwrap_or_else(|| v.clone())
            };

            let best_metric = dist.get(v).copied().unwrap_or(f64::INFINITY);
            let best_hop = first_hop.get(v).cloned();

            let better_metric = candidate_metric + EPS < best_metric;
            let equal_metric = (candidate_metric - best_metric).abs() <= EPS;
            let better_hop = equal_metric && Some(&candidate_hop) < best_hop.as_ref();

            if better_metric || better_hop {
                dist.insert(v.clone(), candidate_metric);
                first_hop.insert(v.clone(), candidate_hop);
                frontier.push(v.clone(), candidate_metric);
                settled.remove(v);
            }
        }
    }

    ShortestPaths { dist, first_hop }
}
