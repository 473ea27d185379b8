pub mod daemon;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ids::{Endpoint, NodeId};
use crate::model::state::{LinkStateDb, NeighborInfo, NeighborTable};
use crate::observability::ObservabilityHook;
use crate::spf;
use crate::wire::Message;

/// A locally attached host: never originates its own LSA, reachable only
/// through this router.
#[derive(Debug, Clone)]
pub struct AttachedHost {
    pub id: NodeId,
    pub endpoint: Endpoint,
}

/// Outbound effect produced by feeding a datagram or timer tick to the
/// router core. The core never touches a socket directly; the daemon I/O
/// loop is responsible for turning these into sends.
#[derive(Debug, Clone)]
pub enum RouterAction {
    SendTo { endpoint: Endpoint, message: Message },
}

/// Pure link-state routing logic: LSDB maintenance, flooding decisions,
/// shortest-path recomputation, and forwarding-table derivation. Holds no
/// socket; the daemon wraps this with I/O.
pub struct RouterCore {
    pub self_id: NodeId,
    pub ttl: u8,
    neighbors: NeighborTable,
    hosts: Vec<AttachedHost>,
    lsdb: LinkStateDb,
    sequence: u64,
    forwarding_table: BTreeMap<NodeId, Endpoint>,
    hook: Arc<dyn ObservabilityHook>,
}

impl RouterCore {
    pub fn new(
        self_id: NodeId,
        ttl: u8,
        neighbors: Vec<NeighborInfo>,
        hosts: Vec<AttachedHost>,
        hook: Arc<dyn ObservabilityHook>,
        now: Instant,
    ) -> Self {
        Self {
            self_id,
            ttl,
            neighbors: NeighborTable::new(neighbors, now),
            hosts,
            lsdb: LinkStateDb::default(),
            sequence: 0,
            forwarding_table: BTreeMap::new(),
            hook,
        }
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn forwarding_table(&self) -> &BTreeMap<NodeId, Endpoint> {
        &self.forwarding_table
    }

    /// Handles a datagram that arrived on `from_endpoint`. `arrival_endpoint`
    /// identifies the interface for split-horizon purposes: an accepted LSA
    /// is reflooded to every direct neighbor except this one.
    pub fn receive(&mut self, message: Message, arrival_endpoint: &Endpoint, now: Instant) -> Vec<RouterAction> {
        match message {
            Message::Lsa {
                originator,
                sequence,
                links,
                ttl,
            } => self.handle_lsa(originator, sequence, links, ttl, arrival_endpoint, now),
            Message::Data { .. } => self.handle_forwardable(message),
            Message::Ack { .. } => self.handle_forwardable(message),
            Message::Hello { .. } => Vec::new(),
        }
    }

    fn handle_lsa(
        &mut self,
        originator: NodeId,
        sequence: u64,
        links: BTreeMap<NodeId, u32>,
        ttl: u8,
        arrival_endpoint: &Endpoint,
        now: Instant,
    ) -> Vec<RouterAction> {
        if originator != self.self_id {
            self.neighbors.mark_seen(&originator, now);
        }

        let accepted = self.lsdb.upsert(originator.clone(), sequence, links.clone(), now);
        if !accepted {
            return Vec::new();
        }

        self.recompute(now);

        let Some(forwarded) = (Message::Lsa {
            originator,
            sequence,
            links,
            ttl,
        })
        .decrement_ttl() else {
            return Vec::new();
        };

        self.neighbors
            .iter()
            .filter(|n| n.is_up && n.endpoint != *arrival_endpoint)
            .map(|n| RouterAction::SendTo {
                endpoint: n.endpoint.clone(),
                message: forwarded.clone(),
            })
            .collect()
    }

    fn handle_forwardable(&mut self, message: Message) -> Vec<RouterAction> {
        let destination = match &message {
            Message::Data { destination, .. } => destination.clone(),
            Message::Ack { destination, .. } => destination.clone(),
            _ => return Vec::new(),
        };

        if let Some(host) = self.hosts.iter().find(|h| h.id == destination) {
            let Some(message) = message.decrement_ttl() else {
                self.hook.ttl_exhausted(&self.self_id, &destination);
                return Vec::new();
            };
            return vec![RouterAction::SendTo {
                endpoint: host.endpoint.clone(),
                message,
            }];
        }

        let Some(endpoint) = self.forwarding_table.get(&destination).cloned() else {
            self.hook.datagram_unroutable(&destination);
            return Vec::new();
        };

        let Some(message) = message.decrement_ttl() else {
            self.hook.ttl_exhausted(&self.self_id, &destination);
            return Vec::new();
        };

        vec![RouterAction::SendTo { endpoint, message }]
    }

    /// Originates a fresh LSA listing currently live neighbors and locally
    /// attached hosts, floods it to every live neighbor, and stores it under
    /// this router's own LSDB entry like any other originator's.
    pub fn originate_lsa(&mut self, now: Instant) -> Vec<RouterAction> {
        self.sequence += 1;
        let mut links: BTreeMap<NodeId, u32> = self
            .neighbors
            .live_neighbors()
            .map(|n| (n.id.clone(), n.link_cost))
            .collect();
        for host in &self.hosts {
            links.insert(host.id.clone(), 0);
        }

        self.lsdb
            .upsert(self.self_id.clone(), self.sequence, links.clone(), now);
        self.recompute(now);

        let message = Message::Lsa {
            originator: self.self_id.clone(),
            sequence: self.sequence,
            links,
            ttl: self.ttl,
        };

        self.neighbors
            .live_neighbors()
            .map(|n| RouterAction::SendTo {
                endpoint: n.endpoint.clone(),
                message: message.clone(),
            })
            .collect()
    }

    /// Ages out stale LSDB entries and dead neighbors. Returns whether
    /// anything changed (callers use this to decide whether to log).
    pub fn age_sweep(&mut self, now: Instant, neighbor_dead_interval: Duration, lsa_max_age: Duration) -> bool {
        let liveness_changed = !self.neighbors.refresh_liveness(now, neighbor_dead_interval).is_empty();
        let lsdb_changed = self.lsdb.age_out(now, lsa_max_age);
        if liveness_changed || lsdb_changed {
            self.recompute(now);
        }
        liveness_changed || lsdb_changed
    }

    fn recompute(&mut self, _now: Instant) {
        let graph = spf::build_graph(&self.lsdb);
        let paths = spf::compute_shortest_paths(&graph, &self.self_id);

        let mut table = BTreeMap::new();
        for (router, hop) in &paths.first_hop {
            if let Some(endpoint) = self.neighbor_endpoint(hop) {
                table.insert(router.clone(), endpoint);
            }
        }
        for record in self.lsdb.records() {
            for host_id in record.links.keys() {
                if self.lsdb.get(host_id).is_some() {
                    continue; // a router, not a stub host
                }
                if record.originator == self.self_id {
                    if let Some(host) = self.hosts.iter().find(|h| &h.id == host_id) {
                        table.insert(host_id.clone(), host.endpoint.clone());
                    }
                    continue;
                }
                if let Some(endpoint) = table.get(&record.originator).cloned() {
                    table.insert(host_id.clone(), endpoint);
                }
            }
        }

        self.forwarding_table = table;
    }

    fn neighbor_endpoint(&self, neighbor_id: &NodeId) -> Option<Endpoint> {
        self.neighbors.get(neighbor_id).map(|n| n.endpoint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::test_support::CapturingHook;

    fn neighbor(id: &str, port: u16, cost: u32) -> NeighborInfo {
        NeighborInfo {
            id: NodeId::from(id),
            endpoint: Endpoint::new("127.0.0.1", port),
            link_cost: cost,
            last_seen: None,
            is_up: false,
        }
    }

    #[test]
    fn originate_lsa_lists_live_neighbors_and_attached_hosts() {
        let hook: Arc<dyn ObservabilityHook> = Arc::new(CapturingHook::default());
        let now = Instant::now();
        let mut router = RouterCore::new(
            NodeId::from("A"),
            16,
            vec![neighbor("B", 6001, 1)],
            vec![AttachedHost {
                id: NodeId::from("H1"),
                endpoint: Endpoint::new("127.0.0.1", 7001),
            }],
            hook,
            now,
        );
        let actions = router.originate_lsa(now);
        assert_eq!(actions.len(), 1);
        let record = router.lsdb.get(&NodeId::from("A")).unwrap();
        assert_eq!(record.links.get(&NodeId::from("B")), Some(&1));
        assert_eq!(record.links.get(&NodeId::from("H1")), Some(&0));
    }

    #[test]
    fn stale_lsa_is_dropped_and_not_reflooded() {
        let hook: Arc<dyn ObservabilityHook> = Arc::new(CapturingHook::default());
        let now = Instant::now();
        let mut router = RouterCore::new(NodeId::from("A"), 16, vec![neighbor("B", 6001, 1)], vec![], hook, now);
        // Arrives via a third party, distinct from B, so split-horizon still lets it reflood to B.
        let arrival = Endpoint::new("127.0.0.1", 6099);

        let lsa = Message::Lsa {
            originator: NodeId::from("C"),
            sequence: 5,
            links: BTreeMap::new(),
            ttl: 16,
        };
        let first = router.receive(lsa.clone(), &arrival, now);
        assert!(!first.is_empty());

        let stale = Message::Lsa {
            originator: NodeId::from("C"),
            sequence: 5,
            links: BTreeMap::new(),
            ttl: 16,
        };
        let second = router.receive(stale, &arrival, now);
        assert!(second.is_empty());
    }

    #[test]
    fn split_horizon_excludes_arrival_endpoint() {
        let hook: Arc<dyn ObservabilityHook> = Arc::new(CapturingHook::default());
        let now = Instant::now();
        let mut router = RouterCore::new(
            NodeId::from("A"),
            16,
            vec![neighbor("B", 6001, 1), neighbor("C", 6002, 1)],
            vec![],
            hook,
            now,
        );

        let arrival = Endpoint::new("127.0.0.1", 6001); // arrived via B
        let lsa = Message::Lsa {
            originator: NodeId::from("D"),
            sequence: 1,
            links: BTreeMap::new(),
            ttl: 16,
        };
        let actions = router.receive(lsa, &arrival, now);
        assert_eq!(actions.len(), 1);
        let RouterAction::SendTo { endpoint, .. } = &actions[0];
        assert_eq!(endpoint.port, 6002);
    }

    #[test]
    fn unroutable_destination_reports_to_observability_hook() {
        let hook = Arc::new(CapturingHook::default());
        let mut router = RouterCore::new(NodeId::from("A"), 16, vec![], vec![], hook.clone(), Instant::now());
        let data = Message::Data {
            source: NodeId::from("H1"),
            destination: NodeId::from("H9"),
            sequence: 1,
            payload: "x".to_string(),
            ttl: 16,
        };
        let actions = router.receive(data, &Endpoint::new("127.0.0.1", 9000), Instant::now());
        assert!(actions.is_empty());
        assert_eq!(hook.unroutable.lock().unwrap().len(), 1);
    }
}
