//! # Cross-Crate Properties
//!
//! Randomized checks over the wired bridge:
//! - a multi-chunk answer of any shape is reassembled in order
//! - peer notifications in any order keep the ceiling and the dataplane
//!   registrations consistent with the link states

use bridge_runtime::{InMemoryDataplane, InboundEvent, OffloadBridge};
use bytes::Bytes;
use ob_01_request_correlation::{ControlEvent, RequestStatus};
use ob_02_peer_link::{ImplicitTeardownReason, PeerCapabilities, PeerLinkState};
use proptest::prelude::*;
use shared_types::OperationClass;
use std::sync::Arc;
use std::time::Duration;

use super::support::*;

#[derive(Debug, Clone)]
enum PeerOp {
    SetupRequest(u8),
    Teardown(u8),
    Implicit(u8),
    ForceKeep(u8, bool),
}

fn peer_op() -> impl Strategy<Value = PeerOp> {
    prop_oneof![
        (0u8..4).prop_map(PeerOp::SetupRequest),
        (0u8..4).prop_map(PeerOp::Teardown),
        (0u8..4).prop_map(PeerOp::Implicit),
        ((0u8..4), any::<bool>()).prop_map(|(n, keep)| PeerOp::ForceKeep(n, keep)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_chunks_reassemble_in_order(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..6)) {
        let expected: Vec<u8> = chunks.concat();
        let script_chunks = chunks.clone();
        let t = start_bridge(bridge_config(), move |request| {
            let last = script_chunks.len() - 1;
            script_chunks
                .iter()
                .enumerate()
                .map(|(i, body)| {
                    let body = Bytes::from(body.clone());
                    let event = if i == last {
                        ControlEvent::terminal(request.class, request.token, body)
                    } else {
                        ControlEvent::partial(request.class, request.token, body)
                    };
                    (Duration::from_millis(2 + i as u64), event)
                })
                .collect()
        });

        let outcome = t
            .bridge
            .issue_operation(OperationClass::LinkStats, Bytes::new(), Duration::from_millis(500))
            .unwrap();

        prop_assert_eq!(&outcome.status, &RequestStatus::Success);
        prop_assert_eq!(outcome.chunk_count, chunks.len());
        prop_assert_eq!(outcome.payload().to_vec(), expected);
        prop_assert!(!t.bridge.snapshot(OperationClass::LinkStats).wait_pending);
    }

    #[test]
    fn prop_peer_notifications_keep_registry_consistent(ops in prop::collection::vec(peer_op(), 1..40)) {
        let config = bridge_config();
        let max_peers = config.peer_link.max_peers;
        let dataplane = Arc::new(InMemoryDataplane::new(8));
        let (bridge, _requests) = OffloadBridge::new(&config, Arc::clone(&dataplane));

        for op in ops {
            match op {
                PeerOp::SetupRequest(n) => {
                    bridge.deliver_event(InboundEvent::PeerSetupRequest {
                        peer: peer(n),
                        capabilities: PeerCapabilities::default(),
                    });
                }
                PeerOp::Teardown(n) => {
                    bridge.deliver_event(InboundEvent::PeerTeardown { peer: peer(n) });
                }
                PeerOp::Implicit(n) => {
                    bridge.deliver_event(InboundEvent::PeerImplicitTeardown {
                        peer: peer(n),
                        reason: ImplicitTeardownReason::Inactivity,
                    });
                }
                PeerOp::ForceKeep(n, keep) => bridge.set_force_keep(peer(n), keep),
            }

            let active = bridge.active_peers();
            prop_assert!(active.len() <= max_peers);

            // Notifications never leave a link half-way.
            let connected = active
                .iter()
                .filter(|(_, state)| *state == PeerLinkState::Connected)
                .count();
            prop_assert_eq!(connected, active.len());
            prop_assert_eq!(dataplane.registered_count(), connected);
            prop_assert_eq!(bridge.peer_stats().active, active.len());
        }

        bridge.shutdown();
        prop_assert_eq!(dataplane.registered_count(), 0);
    }
}
