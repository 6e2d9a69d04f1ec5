//! # End-to-End Scenarios
//!
//! The caller-facing flows of the bridge with a scripted control entity:
//!
//! - **A**: a statistics query answered after 10ms completes successfully
//! - **B**: an unanswered query times out; its late answer is dropped
//! - **C**: a direct link goes Idle → Connecting → Connected → Tearing → Idle

use bridge_runtime::{
    ChannelControlEntity, Delivery, DispatcherCapabilityExchange, InMemoryDataplane, InboundEvent,
};
use bytes::Bytes;
use ob_01_request_correlation::{
    AsyncDispatcher, ControlEvent, DispatchConfig, DropReason, EventDisposition, RequestStatus,
};
use ob_02_peer_link::{
    ImplicitTeardownReason, PeerLinkConfig, PeerLinkService, PeerLinkState, TransitionObserver,
};
use parking_lot::Mutex;
use shared_types::{ErrorKind, MacAddr, OperationClass, StationIndex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::support::*;

/// Wait for `condition` for at most one second.
fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[derive(Default)]
struct RecordingObserver {
    transitions: Mutex<Vec<(MacAddr, PeerLinkState, PeerLinkState)>>,
}

impl TransitionObserver for RecordingObserver {
    fn on_transition(&self, peer: MacAddr, from: PeerLinkState, to: PeerLinkState, _active: usize) {
        self.transitions.lock().push((peer, from, to));
    }
}

// =============================================================================
// SCENARIO A: ANSWERED QUERY
// =============================================================================

#[test]
fn test_scenario_a_stats_answered_after_10ms() {
    let data = Bytes::from_static(b"radio:on_time=86400;iface:beacon_rx=12001");
    let answer = data.clone();
    let t = start_bridge(bridge_config(), move |request| {
        vec![(
            Duration::from_millis(10),
            ControlEvent::terminal(request.class, request.token, answer.clone()),
        )]
    });

    let started = Instant::now();
    let outcome = t
        .bridge
        .issue_operation(OperationClass::LinkStats, Bytes::from_static(b"all"), Duration::from_millis(500))
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.status, RequestStatus::Success);
    assert_eq!(outcome.payload(), data);
    assert_eq!(outcome.chunk_count, 1);
    assert!(elapsed >= Duration::from_millis(10), "returned after {elapsed:?}");
    // Nominally 10-20ms; the bound leaves room for loaded CI hosts.
    assert!(elapsed < Duration::from_millis(250), "returned after {elapsed:?}");

    let seen = t.collaborator.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].payload, Bytes::from_static(b"all"));
    assert_eq!(seen[0].token, outcome.token);
}

#[test]
fn test_multi_chunk_answer_completes_on_terminal_chunk() {
    let t = start_bridge(bridge_config(), |request| {
        vec![
            (
                Duration::from_millis(5),
                ControlEvent::partial(request.class, request.token, Bytes::from_static(b"radio|")),
            ),
            (
                Duration::from_millis(15),
                ControlEvent::partial(request.class, request.token, Bytes::from_static(b"iface|")),
            ),
            (
                Duration::from_millis(25),
                ControlEvent::terminal(request.class, request.token, Bytes::from_static(b"peers")),
            ),
        ]
    });

    let outcome = t
        .bridge
        .issue_operation(OperationClass::ExtScanCachedResults, Bytes::new(), Duration::from_millis(500))
        .unwrap();

    assert_eq!(outcome.status, RequestStatus::Success);
    assert_eq!(outcome.chunk_count, 3);
    assert_eq!(outcome.payload(), Bytes::from_static(b"radio|iface|peers"));
    assert!(outcome.elapsed >= Duration::from_millis(25));
}

#[test]
fn test_chunk_failure_keeps_operation_failed() {
    let t = start_bridge(bridge_config(), |request| {
        let mut failing = ControlEvent::partial(request.class, request.token, Bytes::from_static(b"x"));
        failing.status = -5;
        vec![
            (Duration::from_millis(5), failing),
            (
                Duration::from_millis(15),
                ControlEvent::terminal(request.class, request.token, Bytes::from_static(b"y")),
            ),
        ]
    });

    let outcome = t
        .bridge
        .issue_operation(OperationClass::LinkStats, Bytes::new(), Duration::from_millis(500))
        .unwrap();

    assert_eq!(outcome.status, RequestStatus::Failed(ErrorKind::Firmware { code: -5 }));
    assert_eq!(outcome.chunk_count, 2);
}

// =============================================================================
// SCENARIO B: UNANSWERED QUERY, LATE ANSWER
// =============================================================================

#[test]
fn test_scenario_b_timeout_then_late_event_dropped() {
    let t = start_bridge(bridge_config(), |request| {
        // Nothing within the wait bound; one answer at 600ms.
        vec![(
            Duration::from_millis(600),
            ControlEvent::terminal(request.class, request.token, Bytes::from_static(b"late")),
        )]
    });
    let before = t.bridge.snapshot(OperationClass::LinkStats).stats.dropped_events;

    let started = Instant::now();
    let err = t
        .bridge
        .issue_operation(OperationClass::LinkStats, Bytes::new(), Duration::from_millis(500))
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, ErrorKind::Timeout);
    assert!(elapsed >= Duration::from_millis(500), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "returned after {elapsed:?}");

    let snapshot = t.bridge.snapshot(OperationClass::LinkStats);
    assert!(snapshot.discard_late_results);
    assert_eq!(snapshot.status, RequestStatus::Failed(ErrorKind::Timeout));

    assert!(eventually(|| {
        t.bridge.snapshot(OperationClass::LinkStats).stats.dropped_events > before
    }));
    // Let anything else that might arrive arrive, then check the exact count.
    thread::sleep(Duration::from_millis(100));
    let snapshot = t.bridge.snapshot(OperationClass::LinkStats);
    assert_eq!(snapshot.stats.dropped_events, before + 1);
    assert_eq!(snapshot.stats.timeouts, 1);
}

#[test]
fn test_retry_after_timeout_ignores_old_answer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let t = start_bridge(bridge_config(), move |request| {
        match counter.fetch_add(1, Ordering::SeqCst) {
            // First request: answered long after the caller gave up.
            0 => vec![(
                Duration::from_millis(120),
                ControlEvent::terminal(request.class, request.token, Bytes::from_static(b"old")),
            )],
            _ => vec![(
                Duration::from_millis(150),
                ControlEvent::terminal(request.class, request.token, Bytes::from_static(b"new")),
            )],
        }
    });

    let err = t
        .bridge
        .issue_operation(OperationClass::PnoSetList, Bytes::new(), Duration::from_millis(50))
        .unwrap_err();
    assert_eq!(err, ErrorKind::Timeout);

    // The old answer lands while the retry is waiting and must not complete it.
    let outcome = t
        .bridge
        .issue_operation(OperationClass::PnoSetList, Bytes::new(), Duration::from_millis(500))
        .unwrap();
    assert_eq!(outcome.payload(), Bytes::from_static(b"new"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(t.bridge.snapshot(OperationClass::PnoSetList).stats.dropped_events >= 1);
}

#[test]
fn test_late_event_without_live_token_is_dropped() {
    let t = start_bridge(bridge_config(), |_| Vec::new());

    let stray = ControlEvent::terminal(
        OperationClass::ExtScanStop,
        shared_types::CorrelationToken::new(0xdead),
        Bytes::new(),
    );
    assert_eq!(
        t.bridge.deliver_event(InboundEvent::Operation(stray)),
        Delivery::Operation(EventDisposition::Dropped(DropReason::NoLiveToken))
    );
}

// =============================================================================
// CONCURRENCY ACROSS AND WITHIN CLASSES
// =============================================================================

#[test]
fn test_classes_complete_independently() {
    let t = start_bridge(bridge_config(), |request| {
        let delay = match request.class {
            OperationClass::LinkStats => Duration::from_millis(60),
            _ => Duration::from_millis(10),
        };
        vec![(
            delay,
            ControlEvent::terminal(request.class, request.token, Bytes::from(request.class.as_str())),
        )]
    });

    let slow = {
        let bridge = Arc::clone(&t.bridge);
        thread::spawn(move || {
            bridge.issue_operation(OperationClass::LinkStats, Bytes::new(), Duration::from_millis(500))
        })
    };
    thread::sleep(Duration::from_millis(5));
    let fast = t
        .bridge
        .issue_operation(OperationClass::ExtScanCapabilities, Bytes::new(), Duration::from_millis(500))
        .unwrap();
    assert_eq!(fast.payload(), Bytes::from_static(b"ext_scan_capabilities"));
    assert!(fast.elapsed < Duration::from_millis(60));

    let slow = slow.join().unwrap().unwrap();
    assert_eq!(slow.payload(), Bytes::from_static(b"link_stats"));
}

#[test]
fn test_second_caller_on_same_class_is_busy() {
    let t = start_bridge(bridge_config(), |request| {
        vec![(
            Duration::from_millis(80),
            ControlEvent::terminal(request.class, request.token, Bytes::new()),
        )]
    });

    let first = {
        let bridge = Arc::clone(&t.bridge);
        thread::spawn(move || {
            bridge.issue_operation(OperationClass::PnoReset, Bytes::new(), Duration::from_millis(500))
        })
    };
    assert!(eventually(|| t.bridge.snapshot(OperationClass::PnoReset).wait_pending));

    let err = t
        .bridge
        .issue_operation(OperationClass::PnoReset, Bytes::new(), Duration::from_millis(500))
        .unwrap_err();
    assert_eq!(err, ErrorKind::Busy);

    assert!(first.join().unwrap().unwrap().is_success());
    assert_eq!(t.collaborator.seen().len(), 1);
}

// =============================================================================
// SCENARIO C: DIRECT LINK LIFECYCLE
// =============================================================================

#[test]
fn test_scenario_c_peer_link_lifecycle() {
    let (entity, requests) = ChannelControlEntity::channel(8);
    let dispatcher = Arc::new(AsyncDispatcher::new(DispatchConfig::for_testing(), Arc::new(entity)));
    let exchange = Arc::new(DispatcherCapabilityExchange::new(Arc::clone(&dispatcher)));
    let dataplane = Arc::new(InMemoryDataplane::new(4));
    let observer = Arc::new(RecordingObserver::default());
    let peers = PeerLinkService::new(PeerLinkConfig::for_testing(), Arc::clone(&dataplane), exchange)
        .with_observer(observer.clone());

    let sink_dispatcher = Arc::clone(&dispatcher);
    let sink: EventSink = Arc::new(move |event| {
        sink_dispatcher.deliver(event);
    });
    let collaborator = Collaborator::spawn(requests, sink, capability_responder(Duration::from_millis(10)));

    let addr = peer(0x0c);
    peers.peer_setup(addr).unwrap();

    assert_eq!(peers.peer_state(addr), PeerLinkState::Connected);
    assert_eq!(peers.station_index(addr), Ok(StationIndex(5)));
    assert_eq!(peers.capabilities(addr), Ok(peer_capabilities()));
    assert_eq!(collaborator.seen().len(), 1);
    assert_eq!(collaborator.seen()[0].class, OperationClass::PeerCapabilityExchange);

    peers.peer_teardown(addr).unwrap();
    assert_eq!(peers.peer_state(addr), PeerLinkState::Idle);
    assert_eq!(peers.station_index(addr), Err(ErrorKind::NotConnected));
    assert_eq!(dataplane.registered_count(), 0);

    let path: Vec<_> = observer
        .transitions
        .lock()
        .iter()
        .map(|(_, from, to)| (*from, *to))
        .collect();
    assert_eq!(
        path,
        vec![
            (PeerLinkState::Idle, PeerLinkState::Connecting),
            (PeerLinkState::Connecting, PeerLinkState::Connected),
            (PeerLinkState::Connected, PeerLinkState::Tearing),
            (PeerLinkState::Tearing, PeerLinkState::Idle),
        ]
    );
}

#[test]
fn test_scenario_c_through_bridge_facade() {
    let t = start_bridge(bridge_config(), capability_responder(Duration::from_millis(10)));
    let addr = peer(0x0d);

    t.bridge.peer_setup(addr).unwrap();
    assert_eq!(t.bridge.peer_state(addr), PeerLinkState::Connected);
    assert_eq!(t.bridge.station_index(addr), Ok(StationIndex(5)));

    // Idempotent while Connected: no second exchange.
    t.bridge.peer_setup(addr).unwrap();
    assert_eq!(t.collaborator.seen().len(), 1);

    t.bridge.peer_teardown(addr).unwrap();
    assert_eq!(t.bridge.peer_state(addr), PeerLinkState::Idle);
    assert_eq!(t.bridge.peer_teardown(addr), Err(ErrorKind::NotConnected));
}

#[test]
fn test_unanswered_exchange_returns_link_to_idle() {
    let t = start_bridge(bridge_config(), |_| Vec::new());
    let addr = peer(0x0e);

    assert_eq!(t.bridge.peer_setup(addr), Err(ErrorKind::Timeout));
    assert_eq!(t.bridge.peer_state(addr), PeerLinkState::Idle);
    assert_eq!(t.dataplane.registered_count(), 0);
    assert_eq!(t.bridge.peer_stats().active, 0);
}

#[test]
fn test_concurrent_setups_share_the_exchange_bound() {
    let config = bridge_config();
    let bound = config.peer_link.capability_exchange_timeout;
    let t = start_bridge(config, |_| Vec::new());

    let handles: Vec<_> = [peer(0x21), peer(0x22)]
        .into_iter()
        .map(|addr| {
            let bridge = Arc::clone(&t.bridge);
            thread::spawn(move || {
                let started = Instant::now();
                let result = bridge.peer_setup(addr);
                (addr, result, started.elapsed())
            })
        })
        .collect();

    for handle in handles {
        let (addr, result, elapsed) = handle.join().unwrap();
        assert_eq!(result, Err(ErrorKind::Timeout));
        assert!(elapsed < bound + Duration::from_millis(60), "setup of {addr} took {elapsed:?}");
        assert_eq!(t.bridge.peer_state(addr), PeerLinkState::Idle);
    }
    assert_eq!(t.bridge.peer_stats().active, 0);
}

#[test]
fn test_peer_ceiling() {
    let t = start_bridge(bridge_config(), capability_responder(Duration::from_millis(2)));

    t.bridge.peer_setup(peer(1)).unwrap();
    t.bridge.peer_setup(peer(2)).unwrap();
    assert_eq!(
        t.bridge.peer_setup(peer(3)),
        Err(ErrorKind::CapacityExceeded { max: 2 })
    );
    assert_eq!(t.bridge.peer_state(peer(3)), PeerLinkState::Idle);

    t.bridge.peer_teardown(peer(1)).unwrap();
    t.bridge.peer_setup(peer(3)).unwrap();
    assert_eq!(t.bridge.active_peers().len(), 2);
}

#[test]
fn test_peer_initiated_events_through_queue() {
    let t = start_bridge(bridge_config(), |_| Vec::new());
    let addr = peer(0x21);

    t.events
        .blocking_send(InboundEvent::PeerSetupRequest {
            peer: addr,
            capabilities: peer_capabilities(),
        })
        .unwrap();
    assert!(eventually(|| t.bridge.peer_state(addr) == PeerLinkState::Connected));

    t.bridge.set_force_keep(addr, true);
    t.events
        .blocking_send(InboundEvent::PeerImplicitTeardown {
            peer: addr,
            reason: ImplicitTeardownReason::BaseChannelLost,
        })
        .unwrap();
    assert!(eventually(|| t.bridge.peer_stats().implicit_suppressed == 1));
    assert_eq!(t.bridge.peer_state(addr), PeerLinkState::Connected);

    t.events
        .blocking_send(InboundEvent::PeerTeardown { peer: addr })
        .unwrap();
    assert!(eventually(|| t.bridge.peer_state(addr) == PeerLinkState::Idle));
    assert_eq!(t.dataplane.registered_count(), 0);
}
