//! Outbound ports (SPI) for request correlation.

use thiserror::Error;

use crate::events::ForwardedRequest;

/// Why the control entity refused a hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardRejection {
    #[error("control entity queue is full")]
    QueueFull,

    #[error("control entity is disconnected")]
    Disconnected,

    #[error("refused: {0}")]
    Refused(String),
}

/// The external firmware / radio management entity.
///
/// `forward` is one-way: it only reports whether the request was accepted.
/// Results come back later as `ControlEvent`s on the event-delivery thread.
pub trait ControlEntity: Send + Sync {
    /// Hand a token-stamped request to the entity.
    ///
    /// Must not block on the entity's processing of the request.
    fn forward(&self, request: ForwardedRequest) -> Result<(), ForwardRejection>;
}

impl<T: ControlEntity + ?Sized> ControlEntity for std::sync::Arc<T> {
    fn forward(&self, request: ForwardedRequest) -> Result<(), ForwardRejection> {
        (**self).forward(request)
    }
}
