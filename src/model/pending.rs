use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::ids::NodeId;

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub sequence: u64,
    pub destination: NodeId,
    pub payload: String,
    pub first_sent: Instant,
    pub attempts: u32,
}

/// Due requests returned by a retry scan, ready for retransmission.
#[derive(Debug, Clone)]
pub struct DueRetransmit {
    pub sequence: u64,
    pub destination: NodeId,
    pub payload: String,
}

/// Tracks in-flight host requests awaiting an ACK, keyed by local sequence.
#[derive(Debug, Default)]
pub struct PendingRequestTable {
    pending: BTreeMap<u64, PendingRequest>,
}

impl PendingRequestTable {
    pub fn insert(&mut self, sequence: u64, destination: NodeId, payload: String, now: Instant) {
        self.pending.insert(
            sequence,
            PendingRequest {
                sequence,
                destination,
                payload,
                first_sent: now,
                attempts: 1,
            },
        );
    }

    /// Removes the pending request matching `ack_sequence`/`from`, if any.
    /// Unmatched ACKs (wrong sequence, or acked by a different source than
    /// the original destination) are ignored.
    pub fn acknowledge(&mut self, ack_sequence: u64, from: &NodeId) -> bool {
        match self.pending.get(&ack_sequence) {
            Some(req) if &req.destination == from => {
                self.pending.remove(&ack_sequence);
                true
            }
            _ => false,
        }
    }

    /// Scans for requests due for retransmission (`now - first_sent >=
    /// retry_interval * attempts`). Requests beyond `max_attempts` are
    /// abandoned and removed, returned separately from the due set.
    pub fn scan(
        &mut self,
        now: Instant,
        retry_interval: Duration,
        max_attempts: u32,
    ) -> (Vec<DueRetransmit>, Vec<PendingRequest>) {
        let mut due = Vec::new();
        let mut abandoned = Vec::new();
        let mut to_remove = Vec::new();

        for (seq, req) in &mut self.pending {
            if req.attempts > max_attempts {
                to_remove.push(*seq);
                continue;
            }
            let elapsed = now.saturating_duration_since(req.first_sent);
            let threshold = retry_interval.mul_f64(f64::from(req.attempts));
            if elapsed < threshold {
                continue;
            }
            req.attempts += 1;
            if req.attempts > max_attempts {
                to_remove.push(*seq);
                continue;
            }
            due.push(DueRetransmit {
                sequence: *seq,
                destination: req.destination.clone(),
                payload: req.payload.clone(),
            });
        }

        for seq in to_remove {
            if let Some(req) = self.pending.remove(&seq) {
                abandoned.push(req);
            }
        }

        (due, abandoned)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
