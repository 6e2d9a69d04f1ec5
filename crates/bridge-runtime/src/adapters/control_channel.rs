//! Control-entity adapter over a bounded tokio channel.
//!
//! `forward` never waits for queue space: a full queue is reported back to
//! the dispatcher as a rejection so the caller is never stuck behind a slow
//! or absent firmware.

use ob_01_request_correlation::{ControlEntity, ForwardRejection, ForwardedRequest};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

/// Sending half of the request queue.
#[derive(Debug, Clone)]
pub struct ChannelControlEntity {
    sender: mpsc::Sender<ForwardedRequest>,
}

impl ChannelControlEntity {
    /// Create the adapter and the receiving end for the firmware side.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<ForwardedRequest>) {
        let (sender, receiver) = mpsc::channel(depth);
        (Self { sender }, receiver)
    }

    /// Free slots left in the queue.
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl ControlEntity for ChannelControlEntity {
    fn forward(&self, request: ForwardedRequest) -> Result<(), ForwardRejection> {
        let class = request.class;
        let token = request.token;
        match self.sender.try_send(request) {
            Ok(()) => {
                trace!(class = %class, token = %token, "Request queued for control entity");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(ForwardRejection::QueueFull),
            Err(TrySendError::Closed(_)) => Err(ForwardRejection::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use shared_types::{CorrelationToken, OperationClass};

    fn request(token: u32) -> ForwardedRequest {
        ForwardedRequest {
            class: OperationClass::PnoReset,
            token: CorrelationToken::new(token),
            payload: Bytes::new(),
        }
    }

    #[test]
    fn test_forward_delivers_in_order() {
        let (entity, mut rx) = ChannelControlEntity::channel(4);
        entity.forward(request(1)).unwrap();
        entity.forward(request(2)).unwrap();

        assert_eq!(rx.try_recv().unwrap().token, CorrelationToken::new(1));
        assert_eq!(rx.try_recv().unwrap().token, CorrelationToken::new(2));
    }

    #[test]
    fn test_full_queue_is_rejected() {
        let (entity, _rx) = ChannelControlEntity::channel(1);
        entity.forward(request(1)).unwrap();
        assert_eq!(entity.remaining_capacity(), 0);
        assert_eq!(entity.forward(request(2)), Err(ForwardRejection::QueueFull));
    }

    #[test]
    fn test_closed_queue_is_rejected() {
        let (entity, rx) = ChannelControlEntity::channel(1);
        drop(rx);
        assert!(entity.is_closed());
        assert_eq!(entity.forward(request(1)), Err(ForwardRejection::Disconnected));
    }
}
