use crate::ids::NodeId;

/// Surfaces drops and permanent failures worth a human's attention, kept
/// separate from the ordinary `tracing` call sites so tests can substitute a
/// capturing implementation instead of scraping log output.
pub trait ObservabilityHook: Send + Sync {
    fn datagram_unroutable(&self, destination: &NodeId) {
        let _ = destination;
    }

    fn ttl_exhausted(&self, source: &NodeId, destination: &NodeId) {
        let _ = (source, destination);
    }

    fn request_abandoned(&self, destination: &NodeId, sequence: u64, attempts: u32) {
        let _ = (destination, sequence, attempts);
    }
}

/// Default hook: logs through the ambient structured-logging crate at the
/// levels a transit router or host would reasonably want surfaced.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObservabilityHook;

impl ObservabilityHook for TracingObservabilityHook {
    fn datagram_unroutable(&self, destination: &NodeId) {
        tracing::warn!(%destination, "no forwarding entry for destination, dropping datagram");
    }

    fn ttl_exhausted(&self, source: &NodeId, destination: &NodeId) {
        tracing::warn!(%source, %destination, "ttl exhausted, dropping datagram");
    }

    fn request_abandoned(&self, destination: &NodeId, sequence: u64, attempts: u32) {
        tracing::warn!(%destination, sequence, attempts, "request abandoned after exhausting retries");
    }
}
