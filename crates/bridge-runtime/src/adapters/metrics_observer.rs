//! Peer-link transition observer feeding Prometheus.

use ob_02_peer_link::{PeerLinkState, TransitionObserver};
use shared_types::MacAddr;

/// Counts transitions and tracks the active-link gauge.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTransitionObserver;

impl TransitionObserver for MetricsTransitionObserver {
    fn on_transition(&self, _peer: MacAddr, from: PeerLinkState, to: PeerLinkState, active: usize) {
        ob_telemetry::record_peer_transition(from.as_str(), to.as_str(), active);
    }
}
