//! # Loopback Firmware
//!
//! Scripted stand-in for the firmware control entity. Reads forwarded
//! requests off the request queue and, after a simulated latency, pushes the
//! result chunks back onto the event queue with the request's token.
//!
//! Multi-chunk classes answer the way the firmware batches them:
//! - `LinkStats`: radio, interface and peer records, one chunk each
//! - `ExtScanCachedResults`: one chunk per cached scan
//!
//! Failures, silence (lost responses) and per-class latency can be scripted
//! for tests.

use bytes::Bytes;
use ob_01_request_correlation::{ControlEvent, ForwardedRequest};
use ob_02_peer_link::PeerCapabilities;
use rand::Rng;
use serde_json::json;
use shared_types::{OperationClass, StatusCode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::adapters::CapabilityFrame;
use crate::bridge::FirmwarePort;
use crate::container::LoopbackConfig;
use crate::handlers::InboundEvent;

/// `-EINVAL`, returned for requests the loopback cannot parse.
pub const STATUS_INVALID_ARGUMENT: StatusCode = -22;

/// Scripted firmware behaviour.
#[derive(Debug, Clone)]
pub struct LoopbackFirmware {
    latency: Duration,
    jitter: Duration,
    class_latency: HashMap<OperationClass, Duration>,
    failures: HashMap<OperationClass, StatusCode>,
    silent: HashSet<OperationClass>,
    peer_capabilities: PeerCapabilities,
    cached_scans: usize,
}

impl LoopbackFirmware {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            latency: config.latency,
            jitter: config.jitter,
            class_latency: HashMap::new(),
            failures: HashMap::new(),
            silent: HashSet::new(),
            peer_capabilities: PeerCapabilities {
                responder: true,
                ps_queue_mask: 0x0f,
                max_service_period: 0,
                buffer_sta: true,
                off_channel: false,
                supported_channels: vec![1, 6, 11, 36],
                operating_classes: vec![81, 115],
            },
            cached_scans: 3,
        }
    }

    /// Fixed latency for one class, without jitter.
    pub fn with_class_latency(mut self, class: OperationClass, latency: Duration) -> Self {
        self.class_latency.insert(class, latency);
        self
    }

    /// Answer `class` with a single failure chunk carrying `code`.
    pub fn with_failure(mut self, class: OperationClass, code: StatusCode) -> Self {
        self.failures.insert(class, code);
        self
    }

    /// Never answer `class`.
    pub fn with_silence(mut self, class: OperationClass) -> Self {
        self.silent.insert(class);
        self
    }

    /// Capabilities every simulated peer answers with.
    pub fn with_peer_capabilities(mut self, capabilities: PeerCapabilities) -> Self {
        self.peer_capabilities = capabilities;
        self
    }

    /// Number of chunks in a cached scan result (at least one).
    pub fn with_cached_scans(mut self, scans: usize) -> Self {
        self.cached_scans = scans.max(1);
        self
    }

    /// Run on the current tokio runtime until the request queue closes.
    pub fn spawn(self, port: FirmwarePort) -> JoinHandle<()> {
        let FirmwarePort { requests, events } = port;
        tokio::spawn(self.run(requests, events))
    }

    pub async fn run(
        self,
        mut requests: mpsc::Receiver<ForwardedRequest>,
        events: mpsc::Sender<InboundEvent>,
    ) {
        info!(
            latency_ms = self.latency.as_millis() as u64,
            jitter_ms = self.jitter.as_millis() as u64,
            "Loopback firmware running"
        );
        let firmware = Arc::new(self);

        while let Some(request) = requests.recv().await {
            if firmware.silent.contains(&request.class) {
                debug!(class = %request.class, token = %request.token, "Dropping request without answer");
                continue;
            }

            let delay = firmware.delay_for(request.class);
            let chunks = firmware.respond(&request);
            let events = events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for chunk in chunks {
                    if events.send(InboundEvent::Operation(chunk)).await.is_err() {
                        break;
                    }
                }
            });
        }

        debug!("Request queue closed, loopback firmware stopped");
    }

    fn delay_for(&self, class: OperationClass) -> Duration {
        if let Some(latency) = self.class_latency.get(&class) {
            return *latency;
        }
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.latency;
        }
        self.latency + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// Result chunks for one request, terminal chunk last.
    pub fn respond(&self, request: &ForwardedRequest) -> Vec<ControlEvent> {
        let class = request.class;
        let token = request.token;

        if let Some(code) = self.failures.get(&class) {
            return vec![ControlEvent::failure(class, token, *code)];
        }

        let bodies: Vec<Bytes> = match class {
            OperationClass::ExtScanCapabilities => vec![json_chunk(json!({
                "max_scan_cache_size": 512,
                "max_scan_buckets": 16,
                "max_ap_cache_per_scan": 32,
                "max_rssi_sample_size": 8,
                "max_scan_reporting_threshold": 75,
            }))],
            OperationClass::ExtScanCachedResults => (0..self.cached_scans)
                .map(|scan_id| {
                    json_chunk(json!({
                        "scan_id": scan_id,
                        "flags": 0,
                        "results": [
                            { "bssid": format!("02:00:00:00:{:02x}:01", scan_id), "channel": 6, "rssi": -48 },
                            { "bssid": format!("02:00:00:00:{:02x}:02", scan_id), "channel": 36, "rssi": -67 },
                        ],
                    }))
                })
                .collect(),
            OperationClass::LinkStats => vec![
                json_chunk(json!({ "radio": { "on_time_ms": 86_400, "tx_time_ms": 1_250, "rx_time_ms": 9_800 } })),
                json_chunk(json!({ "iface": { "beacon_rx": 12_001, "rssi_mgmt": -52, "ac_be_tx_mpdu": 48_112 } })),
                json_chunk(json!({ "peers": [ { "type": "ap", "num_rate": 12 } ] })),
            ],
            OperationClass::PeerCapabilityExchange => {
                match CapabilityFrame::decode(&request.payload) {
                    Ok(frame) => {
                        let answer = CapabilityFrame {
                            peer: frame.peer,
                            capabilities: self.peer_capabilities.clone(),
                        };
                        match answer.encode() {
                            Ok(body) => vec![body],
                            Err(_) => {
                                return vec![ControlEvent::failure(
                                    class,
                                    token,
                                    STATUS_INVALID_ARGUMENT,
                                )]
                            }
                        }
                    }
                    Err(_) => {
                        return vec![ControlEvent::failure(class, token, STATUS_INVALID_ARGUMENT)]
                    }
                }
            }
            OperationClass::ExtScanStart
            | OperationClass::ExtScanStop
            | OperationClass::PnoSetList
            | OperationClass::PnoReset
            | OperationClass::LinkStatsClear => vec![Bytes::new()],
        };

        trace!(class = %class, token = %token, chunks = bodies.len(), "Scripted answer");

        let last = bodies.len().saturating_sub(1);
        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                if i == last {
                    ControlEvent::terminal(class, token, body)
                } else {
                    ControlEvent::partial(class, token, body)
                }
            })
            .collect()
    }
}

impl Default for LoopbackFirmware {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

fn json_chunk(value: serde_json::Value) -> Bytes {
    Bytes::from(value.to_string())
}
