use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// A single datagram exchanged between routers and hosts.
///
/// Tagged internally by `kind` so the wire form matches the field naming a
/// packet sniffer would show: `{"kind":"LSA", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Message {
    #[serde(rename = "LSA")]
    Lsa {
        originator: NodeId,
        sequence: u64,
        links: BTreeMap<NodeId, u32>,
        ttl: u8,
    },
    #[serde(rename = "DATA")]
    Data {
        source: NodeId,
        destination: NodeId,
        sequence: u64,
        payload: String,
        ttl: u8,
    },
    #[serde(rename = "ACK")]
    Ack {
        source: NodeId,
        destination: NodeId,
        ack_sequence: u64,
    },
    #[serde(rename = "HELLO")]
    Hello { source: NodeId, timestamp: f64 },
}

impl Message {
    pub fn ttl(&self) -> Option<u8> {
        match self {
            Message::Lsa { ttl, .. } | Message::Data { ttl, .. } => Some(*ttl),
            Message::Ack { .. } | Message::Hello { .. } => None,
        }
    }

    /// Decrements the hop counter, returning `None` when it reaches zero —
    /// the datagram must be dropped rather than forwarded any further.
    pub fn decrement_ttl(self) -> Option<Self> {
        match self {
            Message::Lsa {
                originator,
                sequence,
                links,
                ttl,
            } => {
                let ttl = ttl.saturating_sub(1);
                (ttl > 0).then_some(Message::Lsa {
                    originator,
                    sequence,
                    links,
                    ttl,
                })
            }
            Message::Data {
                source,
                destination,
                sequence,
                payload,
                ttl,
            } => {
                let ttl = ttl.saturating_sub(1);
                (ttl > 0).then_some(Message::Data {
                    source,
                    destination,
                    sequence,
                    payload,
                    ttl,
                })
            }
            other => Some(other),
        }
    }
}

pub fn encode(message: &Message) -> Result<Vec<u8>> {
    serde_json::to_vec(message).context("failed to encode wire message")
}

/// Decodes a datagram payload. Malformed JSON, missing required fields, and
/// unrecognized `kind` values are all reported uniformly as an error; callers
/// are expected to log and drop rather than propagate.
pub fn decode(data: &[u8]) -> Result<Message> {
    serde_json::from_slice(data).context("failed to decode wire message")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsa_roundtrip() {
        let msg = Message::Lsa {
            originator: NodeId::from("A"),
            sequence: 4,
            links: BTreeMap::from([(NodeId::from("B"), 1), (NodeId::from("H1"), 0)]),
            ttl: 16,
        };
        let encoded = encode(&msg).expect("encode should succeed");
        let decoded = decode(&encoded).expect("decode should succeed");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn data_roundtrip() {
        let msg = Message::Data {
            source: NodeId::from("H1"),
            destination: NodeId::from("H2"),
            sequence: 7,
            payload: "ping".to_string(),
            ttl: 16,
        };
        let encoded = encode(&msg).expect("encode should succeed");
        let decoded = decode(&encoded).expect("decode should succeed");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn wire_tag_uses_uppercase_kind_names() {
        let msg = Message::Ack {
            source: NodeId::from("H2"),
            destination: NodeId::from("H1"),
            ack_sequence: 7,
        };
        let encoded = encode(&msg).expect("encode should succeed");
        let text = String::from_utf8(encoded).expect("utf8");
        assert!(text.contains("\"kind\":\"ACK\""));
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let raw = br#"{"kind":"BYE","source":"A"}"#;
        assert!(decode(raw).is_err());
    }

    #[test]
    fn decode_rejects_missing_required_field() {
        let raw = br#"{"kind":"DATA","source":"A","destination":"B","sequence":1}"#;
        assert!(decode(raw).is_err());
    }

    #[test]
    fn data_ttl_one_is_dropped_before_forwarding() {
        let msg = Message::Data {
            source: NodeId::from("A"),
            destination: NodeId::from("B"),
            sequence: 1,
            payload: String::new(),
            ttl: 1,
        };
        assert!(msg.decrement_ttl().is_none());
    }

    #[test]
    fn data_ttl_two_survives_one_hop() {
        let msg = Message::Data {
            source: NodeId::from("A"),
            destination: NodeId::from("B"),
            sequence: 1,
            payload: String::new(),
            ttl: 2,
        };
        let decremented = msg.decrement_ttl().expect("ttl 2 -> 1 still forwards");
        assert_eq!(decremented.ttl(), Some(1));
    }
}
