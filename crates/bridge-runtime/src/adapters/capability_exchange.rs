//! Capability exchange over the correlation engine.
//!
//! The peer-link service needs one synchronous round trip with the peer per
//! setup. The request is an ordinary `PeerCapabilityExchange` operation:
//! the local record is marshaled as JSON, forwarded through the dispatcher,
//! and the peer's answer is decoded from the completed result.

use bytes::Bytes;
use ob_01_request_correlation::{AsyncDispatcher, ControlEntity, RequestStatus};
use ob_02_peer_link::{CapabilityExchange, PeerCapabilities};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{ErrorKind, MacAddr, OperationClass};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Wire body of both directions of the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFrame {
    pub peer: MacAddr,
    pub capabilities: PeerCapabilities,
}

impl CapabilityFrame {
    pub fn encode(&self) -> Result<Bytes, ErrorKind> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| ErrorKind::CapabilityExchangeFailed {
                reason: format!("encode: {e}"),
            })
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ErrorKind> {
        serde_json::from_slice(payload).map_err(|e| ErrorKind::CapabilityExchangeFailed {
            reason: format!("decode: {e}"),
        })
    }
}

/// [`CapabilityExchange`] adapter backed by an [`AsyncDispatcher`].
pub struct DispatcherCapabilityExchange<E: ControlEntity> {
    dispatcher: Arc<AsyncDispatcher<E>>,
    /// One context serves every peer, so exchanges run one at a time.
    /// Waiting for a turn counts against the exchange timeout.
    in_flight: Mutex<()>,
}

impl<E: ControlEntity> DispatcherCapabilityExchange<E> {
    pub fn new(dispatcher: Arc<AsyncDispatcher<E>>) -> Self {
        Self {
            dispatcher,
            in_flight: Mutex::new(()),
        }
    }
}

impl<E: ControlEntity> CapabilityExchange for DispatcherCapabilityExchange<E> {
    fn exchange(
        &self,
        peer: MacAddr,
        local: &PeerCapabilities,
        timeout: Duration,
    ) -> Result<PeerCapabilities, ErrorKind> {
        let request = CapabilityFrame {
            peer,
            capabilities: local.clone(),
        }
        .encode()?;

        let started = Instant::now();
        let _serialized = match self.in_flight.try_lock_for(timeout) {
            Some(guard) => guard,
            None => {
                warn!(
                    peer = %peer,
                    timeout_ms = timeout.as_millis() as u64,
                    "Capability exchange timed out waiting for its turn"
                );
                return Err(ErrorKind::Timeout);
            }
        };
        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(ErrorKind::Timeout);
        }

        let outcome = self
            .dispatcher
            .issue(OperationClass::PeerCapabilityExchange, request, remaining)?;

        match &outcome.status {
            RequestStatus::Success => {}
            RequestStatus::Failed(error) => {
                warn!(peer = %peer, token = %outcome.token, error = %error, "Capability exchange failed");
                return Err(error.clone());
            }
            RequestStatus::Pending => {
                return Err(ErrorKind::CapabilityExchangeFailed {
                    reason: "completed without a terminal status".to_string(),
                })
            }
        }
        if outcome.truncated {
            return Err(ErrorKind::CapabilityExchangeFailed {
                reason: "answer exceeded the result bound".to_string(),
            });
        }

        let answer = CapabilityFrame::decode(&outcome.payload())?;
        if answer.peer != peer {
            return Err(ErrorKind::CapabilityExchangeFailed {
                reason: format!("answer from {} while negotiating with {peer}", answer.peer),
            });
        }

        debug!(
            peer = %peer,
            token = %outcome.token,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Capabilities exchanged"
        );
        Ok(answer.capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ChannelControlEntity;
    use ob_01_request_correlation::{ControlEvent, DispatchConfig};
    use shared_types::CorrelationToken;
    use std::thread;

    fn peer() -> MacAddr {
        MacAddr::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55])
    }

    fn remote_caps() -> PeerCapabilities {
        PeerCapabilities {
            responder: true,
            ps_queue_mask: 0x03,
            max_service_period: 1,
            buffer_sta: true,
            off_channel: false,
            supported_channels: vec![6, 36],
            operating_classes: vec![81],
        }
    }

    /// Dispatcher whose control entity answers every request with `respond`.
    /// The placeholder token in the returned event is replaced with the live one.
    fn dispatcher_with<F>(respond: F) -> Arc<AsyncDispatcher<ChannelControlEntity>>
    where
        F: Fn(&CapabilityFrame) -> Option<ControlEvent> + Send + 'static,
    {
        let (entity, mut requests) = ChannelControlEntity::channel(4);
        let dispatcher = Arc::new(AsyncDispatcher::new(
            DispatchConfig::for_testing(),
            Arc::new(entity),
        ));
        let sink = Arc::downgrade(&dispatcher);
        thread::spawn(move || {
            while let Some(request) = requests.blocking_recv() {
                let frame = CapabilityFrame::decode(&request.payload).unwrap();
                let Some(mut event) = respond(&frame) else {
                    continue;
                };
                event.token = request.token;
                match sink.upgrade() {
                    Some(dispatcher) => {
                        dispatcher.deliver(event);
                    }
                    None => break,
                }
            }
        });
        dispatcher
    }

    #[test]
    fn test_exchange_returns_peer_capabilities() {
        let dispatcher = dispatcher_with(|frame| {
            let answer = CapabilityFrame {
                peer: frame.peer,
                capabilities: remote_caps(),
            };
            Some(ControlEvent::terminal(
                OperationClass::PeerCapabilityExchange,
                CorrelationToken::new(0),
                answer.encode().unwrap(),
            ))
        });
        let exchange = DispatcherCapabilityExchange::new(dispatcher);

        let caps = exchange
            .exchange(peer(), &PeerCapabilities::default(), Duration::from_millis(500))
            .unwrap();
        assert_eq!(caps, remote_caps());
    }

    #[test]
    fn test_firmware_failure_is_surfaced() {
        let dispatcher = dispatcher_with(|_| {
            Some(ControlEvent::failure(
                OperationClass::PeerCapabilityExchange,
                CorrelationToken::new(0),
                -110,
            ))
        });
        let exchange = DispatcherCapabilityExchange::new(dispatcher);

        let err = exchange
            .exchange(peer(), &PeerCapabilities::default(), Duration::from_millis(500))
            .unwrap_err();
        assert_eq!(err, ErrorKind::Firmware { code: -110 });
    }

    #[test]
    fn test_garbage_answer_fails_exchange() {
        let dispatcher = dispatcher_with(|_| {
            Some(ControlEvent::terminal(
                OperationClass::PeerCapabilityExchange,
                CorrelationToken::new(0),
                Bytes::from_static(b"not json"),
            ))
        });
        let exchange = DispatcherCapabilityExchange::new(dispatcher);

        let err = exchange
            .exchange(peer(), &PeerCapabilities::default(), Duration::from_millis(500))
            .unwrap_err();
        assert!(matches!(err, ErrorKind::CapabilityExchangeFailed { .. }));
    }

    #[test]
    fn test_answer_for_other_peer_fails_exchange() {
        let dispatcher = dispatcher_with(|_| {
            let answer = CapabilityFrame {
                peer: MacAddr::new([0x02, 0, 0, 0, 0, 0x99]),
                capabilities: remote_caps(),
            };
            Some(ControlEvent::terminal(
                OperationClass::PeerCapabilityExchange,
                CorrelationToken::new(0),
                answer.encode().unwrap(),
            ))
        });
        let exchange = DispatcherCapabilityExchange::new(dispatcher);

        let err = exchange
            .exchange(peer(), &PeerCapabilities::default(), Duration::from_millis(500))
            .unwrap_err();
        assert!(matches!(err, ErrorKind::CapabilityExchangeFailed { .. }));
    }

    #[test]
    fn test_silent_peer_times_out() {
        let dispatcher = dispatcher_with(|_| None);
        let exchange = DispatcherCapabilityExchange::new(dispatcher);

        let err = exchange
            .exchange(peer(), &PeerCapabilities::default(), Duration::from_millis(30))
            .unwrap_err();
        assert_eq!(err, ErrorKind::Timeout);
    }

    #[test]
    fn test_queued_exchange_stays_within_timeout() {
        let dispatcher = dispatcher_with(|_| None);
        let exchange = Arc::new(DispatcherCapabilityExchange::new(dispatcher));
        let timeout = Duration::from_millis(60);

        let handles: Vec<_> = (0..2u8)
            .map(|n| {
                let exchange = Arc::clone(&exchange);
                thread::spawn(move || {
                    let addr = MacAddr::new([0x02, 0, 0, 0, 0, n]);
                    let started = Instant::now();
                    let result = exchange.exchange(addr, &PeerCapabilities::default(), timeout);
                    (result, started.elapsed())
                })
            })
            .collect();

        for handle in handles {
            let (result, elapsed) = handle.join().unwrap();
            assert_eq!(result, Err(ErrorKind::Timeout));
            assert!(elapsed < timeout + Duration::from_millis(40), "took {elapsed:?}");
        }
    }
}
