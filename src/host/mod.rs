pub mod daemon;

use std::time::{Duration, Instant};

use crate::ids::NodeId;
use crate::model::pending::PendingRequestTable;
use crate::observability::ObservabilityHook;
use crate::rng::Lcg;
use crate::wire::Message;
use std::sync::Arc;

/// Outbound effect produced by feeding a datagram or timer tick to the host
/// core. Hosts never route; every send goes to the local router.
#[derive(Debug, Clone)]
pub struct HostAction {
    pub message: Message,
}

/// Pure reliable-messaging logic for a host: pending-request bookkeeping,
/// retransmission, and the request/response behavior on datagram receipt.
pub struct HostCore {
    pub self_id: NodeId,
    pub ttl: u8,
    known_peers: Vec<NodeId>,
    pending: PendingRequestTable,
    sequence: u64,
    retry_interval: Duration,
    max_attempts: u32,
    rng: Lcg,
    hook: Arc<dyn ObservabilityHook>,
}

impl HostCore {
    pub fn new(
        self_id: NodeId,
        ttl: u8,
        known_peers: Vec<NodeId>,
        retry_interval: Duration,
        max_attempts: u32,
        rng_seed: u64,
        hook: Arc<dyn ObservabilityHook>,
    ) -> Self {
        Self {
            self_id,
            ttl,
            known_peers,
            pending: PendingRequestTable::default(),
            sequence: 0,
            retry_interval,
            max_attempts,
            rng: Lcg::new(rng_seed),
            hook,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn send_data(&mut self, destination: NodeId, payload: String, now: Instant) -> HostAction {
        let sequence = self.next_sequence();
        let message = Message::Data {
            source: self.self_id.clone(),
            destination: destination.clone(),
            sequence,
            payload: payload.clone(),
            ttl: self.ttl,
        };
        self.pending.insert(sequence, destination, payload, now);
        HostAction { message }
    }

    /// Sends `count` datagrams to uniformly random members of the known-peer
    /// set, used once at process startup to seed traffic.
    pub fn startup_burst(&mut self, count: usize, now: Instant) -> Vec<HostAction> {
        if self.known_peers.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|_| {
                let idx = self.rng.next_below(self.known_peers.len());
                let destination = self.known_peers[idx].clone();
                self.send_data(destination, "ping".to_string(), now)
            })
            .collect()
    }

    pub fn on_receive(&mut self, message: Message, now: Instant) -> Vec<HostAction> {
        match message {
            Message::Data {
                source,
                sequence,
                ..
            } => {
                let ack = HostAction {
                    message: Message::Ack {
                        source: self.self_id.clone(),
                        destination: source.clone(),
                        ack_sequence: sequence,
                    },
                };
                let response = self.send_data(source, "pong".to_string(), now);
                vec![ack, response]
            }
            Message::Ack {
                source,
                ack_sequence,
                ..
            } => {
                self.pending.acknowledge(ack_sequence, &source);
                Vec::new()
            }
            Message::Lsa { .. } | Message::Hello { .. } => Vec::new(),
        }
    }

    /// Scans pending requests due for retransmission, abandoning any that
    /// have exhausted their attempts.
    pub fn retry_scan(&mut self, now: Instant) -> Vec<HostAction> {
        let (due, abandoned) = self.pending.scan(now, self.retry_interval, self.max_attempts);
        for req in abandoned {
            self.hook.request_abandoned(&req.destination, req.sequence, req.attempts);
        }
        due.into_iter()
            .map(|retransmit| HostAction {
                message: Message::Data {
                    source: self.self_id.clone(),
                    destination: retransmit.destination,
                    sequence: retransmit.sequence,
                    payload: retransmit.payload,
                    ttl: self.ttl,
                },
            })
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::test_support::CapturingHook;

    fn core(peers: Vec<&str>) -> HostCore {
        let hook: Arc<dyn ObservabilityHook> = Arc::new(CapturingHook::default());
        HostCore::new(
            NodeId::from("H1"),
            16,
            peers.into_iter().map(NodeId::from).collect(),
            Duration::from_secs(5),
            3,
            42,
            hook,
        )
    }

    #[test]
    fn startup_burst_only_targets_known_peers() {
        let mut host = core(vec!["H2", "H3"]);
        let now = Instant::now();
        let actions = host.startup_burst(20, now);
        assert_eq!(actions.len(), 20);
        for action in &actions {
            let Message::Data { destination, .. } = &action.message else {
                panic!("expected DATA");
            };
            assert!(destination.as_str() == "H2" || destination.as_str() == "H3");
        }
        assert_eq!(host.pending_len(), 20);
    }

    #[test]
    fn on_receive_data_emits_ack_and_response() {
        let mut host = core(vec!["H2"]);
        let now = Instant::now();
        let incoming = Message::Data {
            source: NodeId::from("H2"),
            destination: NodeId::from("H1"),
            sequence: 9,
            payload: "ping".to_string(),
            ttl: 16,
        };
        let actions = host.on_receive(incoming, now);
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            actions[0].message,
            Message::Ack { ack_sequence: 9, .. }
        ));
        assert!(matches!(actions[1].message, Message::Data { .. }));
    }

    #[test]
    fn ack_removes_pending_request() {
        let mut host = core(vec!["H2"]);
        let now = Instant::now();
        host.startup_burst(1, now);
        assert_eq!(host.pending_len(), 1);

        let ack = Message::Ack {
            source: NodeId::from("H2"),
            destination: NodeId::from("H1"),
            ack_sequence: 1,
        };
        host.on_receive(ack, now);
        assert_eq!(host.pending_len(), 0);
    }

    #[test]
    fn retry_scan_abandons_after_max_attempts_and_reports_hook() {
        let hook = Arc::new(CapturingHook::default());
        let mut host = HostCore::new(
            NodeId::from("H1"),
            16,
            vec![NodeId::from("H2")],
            Duration::from_secs(5),
            2,
            1,
            hook.clone(),
        );
        let t0 = Instant::now();
        host.startup_burst(1, t0);

        let due = host.retry_scan(t0 + Duration::from_secs(5));
        assert_eq!(due.len(), 1);
        let due = host.retry_scan(t0 + Duration::from_secs(10));
        assert!(due.is_empty());
        assert_eq!(hook.abandoned.lock().unwrap().len(), 1);
    }
}
