//! # Offload Bridge
//!
//! Caller-facing facade over the correlation engine and the peer-link
//! service, plus the wiring that connects them to the control entity.
//!
//! ```text
//!  callers ──issue_operation / peer_setup──→ [OffloadBridge]
//!                                             │           │
//!                                   [AsyncDispatcher]  [PeerLinkService]
//!                                             │           │
//!                              request queue ─┘           └─ DataplaneRegistry
//!                                     ↓
//!                             [control entity] ── event queue ──→ [EventPump]
//!                                                                     │
//!                                             deliver_event ←─────────┘
//! ```
//!
//! The blocking methods must not run on an async worker thread; use the
//! `*_async` wrappers from async code.

use bytes::Bytes;
use ob_01_request_correlation::{
    AsyncDispatcher, ContextSnapshot, EventDisposition, ForwardedRequest, OperationOutcome,
};
use ob_02_peer_link::{
    DataplaneRegistry, PeerCapabilities, PeerLinkService, PeerLinkState, PeerLinkStats,
};
use ob_telemetry::{log_op_event, log_peer_event, TelemetryError};
use shared_types::{ErrorKind, MacAddr, OperationClass, StationIndex};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::adapters::{ChannelControlEntity, DispatcherCapabilityExchange, MetricsTransitionObserver};
use crate::container::BridgeConfig;
use crate::handlers::{Delivery, EventPump, InboundEvent};

/// Dispatcher wired to the request queue.
pub type BridgeDispatcher = AsyncDispatcher<ChannelControlEntity>;

/// Peer-link service wired to the dispatcher-backed capability exchange.
pub type BridgePeerLinks<D> = PeerLinkService<D, DispatcherCapabilityExchange<ChannelControlEntity>>;

/// Errors from the runtime layer itself.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Operation(#[from] ErrorKind),

    #[error("failed to start event delivery thread: {0}")]
    EventThread(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Control-entity side of the two queues.
pub struct FirmwarePort {
    /// Requests forwarded by the dispatcher.
    pub requests: mpsc::Receiver<ForwardedRequest>,
    /// Where the control entity pushes results and notifications.
    pub events: mpsc::Sender<InboundEvent>,
}

/// Everything `OffloadBridge::start` brings up.
pub struct RunningBridge<D: DataplaneRegistry + 'static> {
    pub bridge: Arc<OffloadBridge<D>>,
    pub pump: EventPump,
    pub firmware: FirmwarePort,
}

/// The control-plane bridge.
pub struct OffloadBridge<D: DataplaneRegistry + 'static> {
    dispatcher: Arc<BridgeDispatcher>,
    peers: BridgePeerLinks<D>,
}

impl<D: DataplaneRegistry + 'static> OffloadBridge<D> {
    /// Build the bridge and return the receiving end of the request queue.
    pub fn new(config: &BridgeConfig, dataplane: Arc<D>) -> (Self, mpsc::Receiver<ForwardedRequest>) {
        let (entity, requests) = ChannelControlEntity::channel(config.events.queue_depth);
        let dispatcher = Arc::new(AsyncDispatcher::new(
            config.dispatch.clone(),
            Arc::new(entity),
        ));
        let exchange = Arc::new(DispatcherCapabilityExchange::new(Arc::clone(&dispatcher)));
        let peers = PeerLinkService::new(config.peer_link.clone(), dataplane, exchange)
            .with_observer(Arc::new(MetricsTransitionObserver));

        (Self { dispatcher, peers }, requests)
    }

    /// Build the bridge and start the event-delivery thread.
    pub fn start(config: &BridgeConfig, dataplane: Arc<D>) -> Result<RunningBridge<D>, BridgeError> {
        let (bridge, requests) = Self::new(config, dataplane);
        let bridge = Arc::new(bridge);
        let (events, event_rx) = mpsc::channel(config.events.queue_depth);
        let pump = EventPump::spawn(Arc::clone(&bridge), event_rx)?;

        info!(
            queue_depth = config.events.queue_depth,
            max_peers = config.peer_link.max_peers,
            "Offload bridge started"
        );

        Ok(RunningBridge {
            bridge,
            pump,
            firmware: FirmwarePort { requests, events },
        })
    }

    pub fn dispatcher(&self) -> &Arc<BridgeDispatcher> {
        &self.dispatcher
    }

    pub fn peer_links(&self) -> &BridgePeerLinks<D> {
        &self.peers
    }

    // =========================================================================
    // OFFLOAD OPERATIONS
    // =========================================================================

    /// Issue one offload operation and wait for its correlated result.
    ///
    /// # Errors
    /// - `Busy` while another caller waits on the same class
    /// - `DispatchRejected` when the control entity refused the request, or
    ///   for `PeerCapabilityExchange`, which only peer setup may issue
    /// - `Timeout` when no terminal chunk arrived within `timeout`
    ///
    /// A firmware failure is not an error here: it is reported in the
    /// returned outcome's status.
    pub fn issue_operation(
        &self,
        class: OperationClass,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<OperationOutcome, ErrorKind> {
        let result = Self::caller_class(class)
            .and_then(|()| self.dispatcher.issue(class, payload, timeout));
        self.record(class, &result);
        result
    }

    /// Issue with the configured timeout for `class`.
    pub fn issue_default(
        &self,
        class: OperationClass,
        payload: Bytes,
    ) -> Result<OperationOutcome, ErrorKind> {
        let result =
            Self::caller_class(class).and_then(|()| self.dispatcher.issue_default(class, payload));
        self.record(class, &result);
        result
    }

    /// The capability exchange context belongs to the peer-link adapter,
    /// which serializes its use across peers.
    fn caller_class(class: OperationClass) -> Result<(), ErrorKind> {
        match class {
            OperationClass::PeerCapabilityExchange => Err(ErrorKind::DispatchRejected {
                reason: format!("{} is reserved for peer link setup", class.as_str()),
            }),
            _ => Ok(()),
        }
    }

    /// [`issue_operation`](Self::issue_operation) on the blocking pool.
    pub async fn issue_operation_async(
        self: &Arc<Self>,
        class: OperationClass,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<OperationOutcome, BridgeError> {
        let bridge = Arc::clone(self);
        let outcome =
            tokio::task::spawn_blocking(move || bridge.issue_operation(class, payload, timeout))
                .await??;
        Ok(outcome)
    }

    pub async fn issue_default_async(
        self: &Arc<Self>,
        class: OperationClass,
        payload: Bytes,
    ) -> Result<OperationOutcome, BridgeError> {
        let bridge = Arc::clone(self);
        let outcome = tokio::task::spawn_blocking(move || bridge.issue_default(class, payload))
            .await??;
        Ok(outcome)
    }

    pub fn snapshot(&self, class: OperationClass) -> ContextSnapshot {
        self.dispatcher.snapshot(class)
    }

    pub fn snapshots(&self) -> Vec<ContextSnapshot> {
        self.dispatcher.snapshots()
    }

    fn record(&self, class: OperationClass, result: &Result<OperationOutcome, ErrorKind>) {
        match result {
            Ok(outcome) => {
                ob_telemetry::record_operation(
                    class.as_str(),
                    outcome.status.label(),
                    Some(outcome.elapsed),
                );
                log_op_event!(
                    debug,
                    "runtime",
                    "Operation finished",
                    class,
                    outcome.token,
                    status = outcome.status.label(),
                    chunks = outcome.chunk_count,
                    truncated = outcome.truncated,
                    elapsed_ms = outcome.elapsed.as_millis() as u64
                );
            }
            Err(error) => {
                ob_telemetry::record_operation(class.as_str(), error.label(), None);
                warn!(subsystem = "runtime", class = %class, error = %error, "Operation failed");
            }
        }
    }

    // =========================================================================
    // PEER LINKS
    // =========================================================================

    /// Bring the direct link to `peer` up. Blocks for the capability exchange.
    pub fn peer_setup(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        let result = self.peers.peer_setup(peer);
        match &result {
            Ok(()) => log_peer_event!(info, "runtime", "Peer link ready", peer, state = %self.peers.peer_state(peer)),
            Err(e) => log_peer_event!(warn, "runtime", "Peer setup failed", peer, error = %e),
        }
        result
    }

    pub async fn peer_setup_async(self: &Arc<Self>, peer: MacAddr) -> Result<(), BridgeError> {
        let bridge = Arc::clone(self);
        tokio::task::spawn_blocking(move || bridge.peer_setup(peer)).await??;
        Ok(())
    }

    pub fn peer_teardown(&self, peer: MacAddr) -> Result<(), ErrorKind> {
        let result = self.peers.peer_teardown(peer);
        match &result {
            Ok(()) => log_peer_event!(info, "runtime", "Peer link torn down", peer),
            Err(e) => log_peer_event!(warn, "runtime", "Peer teardown failed", peer, error = %e),
        }
        result
    }

    pub async fn peer_teardown_async(self: &Arc<Self>, peer: MacAddr) -> Result<(), BridgeError> {
        let bridge = Arc::clone(self);
        tokio::task::spawn_blocking(move || bridge.peer_teardown(peer)).await??;
        Ok(())
    }

    pub fn peer_state(&self, peer: MacAddr) -> PeerLinkState {
        self.peers.peer_state(peer)
    }

    pub fn station_index(&self, peer: MacAddr) -> Result<StationIndex, ErrorKind> {
        self.peers.station_index(peer)
    }

    pub fn peer_capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind> {
        self.peers.capabilities(peer)
    }

    pub fn update_peer_capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind> {
        self.peers.update_capabilities(peer)
    }

    pub fn set_force_keep(&self, peer: MacAddr, keep: bool) {
        self.peers.set_force_keep(peer, keep);
    }

    pub fn active_peers(&self) -> Vec<(MacAddr, PeerLinkState)> {
        self.peers.active_peers()
    }

    pub fn peer_stats(&self) -> PeerLinkStats {
        self.peers.stats()
    }

    // =========================================================================
    // EVENT DELIVERY
    // =========================================================================

    /// Route one inbound event. Called on the event-delivery thread.
    pub fn deliver_event(&self, event: InboundEvent) -> Delivery {
        ob_telemetry::record_event_delivered(event.kind());

        match event {
            InboundEvent::Operation(event) => {
                let class = event.class;
                let token = event.token;
                let disposition = self.dispatcher.deliver(event);
                if let EventDisposition::Dropped(reason) = disposition {
                    ob_telemetry::record_dropped_event(class.as_str(), reason.as_str());
                    log_op_event!(debug, "runtime", "Control event dropped", class, token, reason = reason.as_str());
                }
                Delivery::Operation(disposition)
            }
            InboundEvent::PeerSetupRequest { peer, capabilities } => {
                log_peer_event!(debug, "runtime", "Peer requested setup", peer);
                Delivery::PeerLink(self.peers.on_peer_setup_request(peer, capabilities))
            }
            InboundEvent::PeerTeardown { peer } => {
                log_peer_event!(debug, "runtime", "Peer requested teardown", peer);
                Delivery::PeerLink(self.peers.on_peer_teardown(peer))
            }
            InboundEvent::PeerImplicitTeardown { peer, reason } => {
                log_peer_event!(debug, "runtime", "Implicit teardown trigger", peer, reason = reason.as_str());
                Delivery::ImplicitTeardown(self.peers.on_implicit_teardown(peer, reason))
            }
        }
    }

    // =========================================================================
    // DIAGNOSTICS & SHUTDOWN
    // =========================================================================

    /// Prometheus text exposition of all bridge metrics.
    pub fn metrics_text(&self) -> Result<String, TelemetryError> {
        ob_telemetry::gather_text()
    }

    /// Return every peer link to Idle and release its dataplane station.
    ///
    /// Returns the number of links that were cleaned up.
    pub fn shutdown(&self) -> usize {
        let cleaned = self.peers.force_cleanup();
        let pruned = self.peers.prune_idle();
        info!(cleaned, pruned, "Offload bridge shut down");
        cleaned
    }
}
