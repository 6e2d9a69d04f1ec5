//! # Event Delivery
//!
//! Inbound events from the control entity are queued on a bounded tokio
//! channel and drained by one dedicated OS thread. Operation chunks go to
//! the correlation engine; peer notifications go to the peer-link service.
//!
//! The delivery thread never waits on a caller: aggregation only takes the
//! per-class context lock, and peer notifications never run a capability
//! exchange.

use ob_01_request_correlation::{ControlEvent, EventDisposition};
use ob_02_peer_link::{DataplaneRegistry, ImplicitTeardownReason, PeerCapabilities};
use shared_types::{ErrorKind, MacAddr};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::OffloadBridge;

/// Name of the delivery thread.
pub const EVENT_THREAD_NAME: &str = "ob-event-delivery";

/// Everything the control entity can push at the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// One chunk of an offload operation result.
    Operation(ControlEvent),
    /// The peer started a direct-link setup and sent its capabilities.
    PeerSetupRequest {
        peer: MacAddr,
        capabilities: PeerCapabilities,
    },
    /// The peer tore the direct link down.
    PeerTeardown { peer: MacAddr },
    /// An implicit teardown trigger for the peer fired.
    PeerImplicitTeardown {
        peer: MacAddr,
        reason: ImplicitTeardownReason,
    },
}

impl InboundEvent {
    /// Metrics label.
    pub const fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Operation(_) => "operation",
            InboundEvent::PeerSetupRequest { .. } => "peer_setup_request",
            InboundEvent::PeerTeardown { .. } => "peer_teardown",
            InboundEvent::PeerImplicitTeardown { .. } => "peer_implicit_teardown",
        }
    }
}

/// What happened to one delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Operation(EventDisposition),
    PeerLink(Result<(), ErrorKind>),
    /// `Ok(false)` when `force_keep` suppressed the teardown.
    ImplicitTeardown(Result<bool, ErrorKind>),
}

/// Owner of the event-delivery thread.
///
/// The thread runs until every sender of the event queue is dropped.
pub struct EventPump {
    handle: Option<JoinHandle<u64>>,
}

impl EventPump {
    pub fn spawn<D>(
        bridge: Arc<OffloadBridge<D>>,
        mut events: mpsc::Receiver<InboundEvent>,
    ) -> io::Result<Self>
    where
        D: DataplaneRegistry + 'static,
    {
        let handle = thread::Builder::new()
            .name(EVENT_THREAD_NAME.to_string())
            .spawn(move || {
                info!(thread = EVENT_THREAD_NAME, "Event delivery started");
                let mut delivered = 0u64;
                while let Some(event) = events.blocking_recv() {
                    let kind = event.kind();
                    match bridge.deliver_event(event) {
                        Delivery::PeerLink(Err(e)) | Delivery::ImplicitTeardown(Err(e)) => {
                            warn!(kind, error = %e, "Peer notification failed");
                        }
                        other => debug!(kind, delivery = ?other, "Event delivered"),
                    }
                    delivered += 1;
                }
                info!(delivered, "Event queue closed, delivery stopped");
                delivered
            })?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the thread to drain the queue and exit.
    ///
    /// Returns the number of events processed. Blocks until every sender is
    /// gone, so call it from a blocking context.
    pub fn join(mut self) -> u64 {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(delivered)) => delivered,
            Some(Err(_)) => {
                warn!("Event delivery thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("Event pump handle dropped, thread detached");
        }
    }
}
