//! Scripted collaborator and fixtures shared by the integration tests.

use bridge_runtime::{
    BridgeConfig, CapabilityFrame, EventPump, EventsConfig, FirmwarePort, InMemoryDataplane,
    InboundEvent, LoopbackConfig, OffloadBridge, RunningBridge,
};
use ob_01_request_correlation::{ControlEvent, DispatchConfig, ForwardedRequest};
use ob_02_peer_link::{PeerCapabilities, PeerLinkConfig};
use parking_lot::Mutex;
use shared_types::{MacAddr, OperationClass};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Where the collaborator's events go.
pub type EventSink = Arc<dyn Fn(ControlEvent) + Send + Sync>;

/// Answer plan for one request: `(delay after receipt, event)` pairs.
pub type Plan = Vec<(Duration, ControlEvent)>;

/// A control entity whose answers, and their timing, are chosen per test.
///
/// Runs on its own thread. The plan for each request is played by one
/// short-lived thread, in delay order, with delays measured from receipt.
pub struct Collaborator {
    seen: Arc<Mutex<Vec<ForwardedRequest>>>,
    /// Ends by itself once the request queue closes.
    _handle: JoinHandle<()>,
}

impl Collaborator {
    pub fn spawn<F>(mut requests: mpsc::Receiver<ForwardedRequest>, sink: EventSink, mut script: F) -> Self
    where
        F: FnMut(&ForwardedRequest) -> Plan + Send + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let handle = thread::spawn(move || {
            while let Some(request) = requests.blocking_recv() {
                let mut plan = script(&request);
                log.lock().push(request);
                if plan.is_empty() {
                    continue;
                }
                plan.sort_by_key(|(delay, _)| *delay);
                let sink = Arc::clone(&sink);
                let received = Instant::now();
                thread::spawn(move || {
                    for (delay, event) in plan {
                        if let Some(remaining) = delay.checked_sub(received.elapsed()) {
                            thread::sleep(remaining);
                        }
                        sink(event);
                    }
                });
            }
        });
        Self {
            seen,
            _handle: handle,
        }
    }

    /// Requests received so far, in arrival order.
    pub fn seen(&self) -> Vec<ForwardedRequest> {
        self.seen.lock().clone()
    }
}

/// Sink that feeds the bridge's event queue, as firmware would.
pub fn queue_sink(events: mpsc::Sender<InboundEvent>) -> EventSink {
    Arc::new(move |event| {
        let _ = events.blocking_send(InboundEvent::Operation(event));
    })
}

/// Bridge config with short timeouts; `dispatch` overrides are applied by callers.
pub fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        dispatch: DispatchConfig::for_testing(),
        peer_link: PeerLinkConfig::for_testing(),
        events: EventsConfig { queue_depth: 32 },
        loopback: LoopbackConfig::default(),
    }
}

pub struct TestBridge {
    pub bridge: Arc<OffloadBridge<InMemoryDataplane>>,
    pub dataplane: Arc<InMemoryDataplane>,
    pub collaborator: Collaborator,
    pub events: mpsc::Sender<InboundEvent>,
    pub pump: EventPump,
}

/// Start a bridge whose control entity follows `script`.
pub fn start_bridge<F>(config: BridgeConfig, script: F) -> TestBridge
where
    F: FnMut(&ForwardedRequest) -> Plan + Send + 'static,
{
    let dataplane = Arc::new(InMemoryDataplane::new(8));
    let RunningBridge {
        bridge,
        pump,
        firmware: FirmwarePort { requests, events },
    } = OffloadBridge::start(&config, Arc::clone(&dataplane)).unwrap();

    let collaborator = Collaborator::spawn(requests, queue_sink(events.clone()), script);
    TestBridge {
        bridge,
        dataplane,
        collaborator,
        events,
        pump,
    }
}

/// Capabilities a cooperative peer answers with.
pub fn peer_capabilities() -> PeerCapabilities {
    PeerCapabilities {
        responder: true,
        ps_queue_mask: 0x0f,
        max_service_period: 2,
        buffer_sta: true,
        off_channel: true,
        supported_channels: vec![1, 6, 11],
        operating_classes: vec![81],
    }
}

/// Script answering capability exchanges after `delay` and ignoring the rest.
pub fn capability_responder(delay: Duration) -> impl FnMut(&ForwardedRequest) -> Plan + Send + 'static {
    move |request| {
        if request.class != OperationClass::PeerCapabilityExchange {
            return Vec::new();
        }
        let frame = CapabilityFrame::decode(&request.payload).unwrap();
        let answer = CapabilityFrame {
            peer: frame.peer,
            capabilities: peer_capabilities(),
        };
        vec![(
            delay,
            ControlEvent::terminal(request.class, request.token, answer.encode().unwrap()),
        )]
    }
}

pub fn peer(n: u8) -> MacAddr {
    MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, n])
}
