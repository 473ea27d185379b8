use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::ids::{Endpoint, NodeId};

#[derive(Debug, Clone)]
pub struct NeighborInfo {
    pub id: NodeId,
    pub endpoint: Endpoint,
    pub link_cost: u32,
    pub last_seen: Option<Instant>,
    pub is_up: bool,
}

/// Statically configured direct neighbors of a router, with liveness derived
/// from LSA reception rather than a separate HELLO exchange.
#[derive(Debug, Default)]
pub struct NeighborTable {
    neighbors: BTreeMap<NodeId, NeighborInfo>,
}

impl NeighborTable {
    /// Builds the table from static configuration, optimistically marking
    /// every configured neighbor live as of `now`. Without this, a freshly
    /// started router would never originate a non-empty LSA: liveness is
    /// otherwise only confirmed by receiving that neighbor's own LSA, and
    /// nothing is ever sent to a neighbor considered down, so the flood
    /// could never get off the ground. `NEIGHBOR_DEAD_INTERVAL` still aged
    /// the entry out from here if the neighbor never actually answers.
    pub fn new(neighbors: Vec<NeighborInfo>, now: Instant) -> Self {
        let neighbors = neighbors
            .into_iter()
            .map(|mut n| {
                n.is_up = true;
                n.last_seen = Some(now);
                (n.id.clone(), n)
            })
            .collect();
        Self { neighbors }
    }

    /// Marks `id` as seen at `now`. Returns `true` if this is a liveness
    /// transition (the neighbor was previously down or unconfigured).
    pub fn mark_seen(&mut self, id: &NodeId, now: Instant) -> bool {
        let Some(neighbor) = self.neighbors.get_mut(id) else {
            return false;
        };
        let was_up = neighbor.is_up;
        neighbor.last_seen = Some(now);
        neighbor.is_up = true;
        !was_up
    }

    /// Flips any neighbor whose last LSA is older than `dead_interval` to
    /// down. Returns the IDs that changed state.
    pub fn refresh_liveness(&mut self, now: Instant, dead_interval: Duration) -> Vec<NodeId> {
        let mut changed = Vec::new();
        for (id, neighbor) in &mut self.neighbors {
            let Some(last_seen) = neighbor.last_seen else {
                continue;
            };
            let alive = now.saturating_duration_since(last_seen) <= dead_interval;
            if alive != neighbor.is_up {
                neighbor.is_up = alive;
                changed.push(id.clone());
            }
        }
        changed
    }

    pub fn get(&self, id: &NodeId) -> Option<&NeighborInfo> {
        self.neighbors.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborInfo> {
        self.neighbors.values()
    }

    pub fn live_neighbors(&self) -> impl Iterator<Item = &NeighborInfo> {
        self.neighbors.values().filter(|n| n.is_up)
    }
}

#[derive(Debug, Clone)]
pub struct LinkStateRecord {
    pub originator: NodeId,
    pub sequence: u64,
    pub links: BTreeMap<NodeId, u32>,
    pub learned_at: Instant,
}

/// The link-state database: the most recent accepted LSA per originator.
#[derive(Debug, Default)]
pub struct LinkStateDb {
    records: BTreeMap<NodeId, LinkStateRecord>,
}

impl LinkStateDb {
    /// Applies the strict-greater-sequence freshness rule. Returns `true` iff
    /// the LSA was accepted (new originator, or `sequence` strictly exceeds
    /// the stored one); stale or duplicate LSAs are dropped and must not be
    /// reflooded by the caller.
    pub fn upsert(
        &mut self,
        originator: NodeId,
        sequence: u64,
        links: BTreeMap<NodeId, u32>,
        now: Instant,
    ) -> bool {
        if let Some(current) = self.records.get(&originator) {
            if sequence <= current.sequence {
                return false;
            }
        }
        self.records.insert(
            originator.clone(),
            LinkStateRecord {
                originator,
                sequence,
                links,
                learned_at: now,
            },
        );
        true
    }

    pub fn get(&self, originator: &NodeId) -> Option<&LinkStateRecord> {
        self.records.get(originator)
    }

    pub fn records(&self) -> impl Iterator<Item = &LinkStateRecord> {
        self.records.values()
    }

    /// Drops LSDB entries whose originator has not refreshed within
    /// `max_age`. Returns `true` if anything was removed.
    pub fn age_out(&mut self, now: Instant, max_age: Duration) -> bool {
        let before = self.records.len();
        self.records
            .retain(|_, record| now.saturating_duration_since(record.learned_at) <= max_age);
        before != self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(id: &str, cost: u32) -> NeighborInfo {
        NeighborInfo {
            id: NodeId::from(id),
            endpoint: Endpoint::new("127.0.0.1", 6000),
            link_cost: cost,
            last_seen: None,
            is_up: false,
        }
    }

    #[test]
    fn configured_neighbors_start_optimistically_live() {
        let t0 = Instant::now();
        let table = NeighborTable::new(vec![neighbor("B", 1)], t0);
        assert!(table.get(&NodeId::from("B")).unwrap().is_up);
    }

    #[test]
    fn mark_seen_reports_liveness_transition_only_when_neighbor_was_down() {
        let t0 = Instant::now();
        let mut table = NeighborTable::new(vec![neighbor("B", 1)], t0);
        // Already live from construction, so re-confirming it is not a transition.
        assert!(!table.mark_seen(&NodeId::from("B"), t0));

        table.refresh_liveness(t0 + Duration::from_secs(1_000), Duration::from_secs(90));
        assert!(!table.get(&NodeId::from("B")).unwrap().is_up);

        assert!(table.mark_seen(&NodeId::from("B"), t0 + Duration::from_secs(1_001)));
    }

    #[test]
    fn refresh_liveness_marks_dead_after_interval() {
        let t0 = Instant::now();
        let mut table = NeighborTable::new(vec![neighbor("B", 1)], t0);

        let changed = table.refresh_liveness(t0 + Duration::from_secs(1), Duration::from_secs(90));
        assert!(changed.is_empty());

        let changed = table.refresh_liveness(t0 + Duration::from_secs(100), Duration::from_secs(90));
        assert_eq!(changed, vec![NodeId::from("B")]);
        assert!(!table.get(&NodeId::from("B")).unwrap().is_up);
    }

    #[test]
    fn lsdb_upsert_rejects_stale_and_equal_sequence() {
        let mut db = LinkStateDb::default();
        let now = Instant::now();
        assert!(db.upsert(NodeId::from("A"), 5, BTreeMap::new(), now));
        assert!(!db.upsert(NodeId::from("A"), 5, BTreeMap::new(), now));
        assert!(!db.upsert(NodeId::from("A"), 4, BTreeMap::new(), now));
        assert!(db.upsert(NodeId::from("A"), 6, BTreeMap::new(), now));
    }

    #[test]
    fn lsdb_age_out_drops_stale_originators() {
        let mut db = LinkStateDb::default();
        let t0 = Instant::now();
        db.upsert(NodeId::from("A"), 1, BTreeMap::new(), t0);
        assert!(!db.age_out(t0 + Duration::from_secs(10), Duration::from_secs(90)));
        assert!(db.age_out(t0 + Duration::from_secs(100), Duration::from_secs(90)));
        assert!(db.get(&NodeId::from("A")).is_none());
    }
}
