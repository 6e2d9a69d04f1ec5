//! # Messages Crossing the Dispatcher Boundary
//!
//! - `ForwardedRequest`: outbound, the caller's payload stamped with a token
//! - `ControlEvent`: inbound, one tagged chunk from the control entity
//! - `OperationOutcome`: returned to the caller after the terminal chunk

use bytes::{Bytes, BytesMut};
use shared_types::{CorrelationToken, OperationClass, StatusCode, STATUS_OK};
use std::time::Duration;

use crate::domain::{CompletedResult, RequestStatus};

/// Request handed to the control entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRequest {
    pub class: OperationClass,
    pub token: CorrelationToken,
    pub payload: Bytes,
}

/// One `(token, status, more_data, payload)` event from the control entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    pub class: OperationClass,
    pub token: CorrelationToken,
    pub status: StatusCode,
    pub more_data: bool,
    pub payload: Bytes,
}

impl ControlEvent {
    /// Successful terminal chunk.
    pub fn terminal(class: OperationClass, token: CorrelationToken, payload: Bytes) -> Self {
        Self {
            class,
            token,
            status: STATUS_OK,
            more_data: false,
            payload,
        }
    }

    /// Successful non-terminal chunk.
    pub fn partial(class: OperationClass, token: CorrelationToken, payload: Bytes) -> Self {
        Self {
            class,
            token,
            status: STATUS_OK,
            more_data: true,
            payload,
        }
    }

    /// Terminal chunk carrying a failure code and no payload.
    pub fn failure(class: OperationClass, token: CorrelationToken, status: StatusCode) -> Self {
        Self {
            class,
            token,
            status,
            more_data: false,
            payload: Bytes::new(),
        }
    }
}

/// Finalized result of one `issue` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub class: OperationClass,
    pub token: CorrelationToken,
    pub status: RequestStatus,
    pub chunks: Vec<Bytes>,
    pub chunk_count: usize,
    pub truncated: bool,
    pub elapsed: Duration,
}

impl OperationOutcome {
    pub(crate) fn new(
        class: OperationClass,
        token: CorrelationToken,
        status: RequestStatus,
        result: CompletedResult,
        elapsed: Duration,
    ) -> Self {
        Self {
            class,
            token,
            status,
            chunks: result.chunks,
            chunk_count: result.chunk_count,
            truncated: result.truncated,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// All chunks joined into one buffer.
    pub fn payload(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            many => {
                let mut buf = BytesMut::with_capacity(many.iter().map(Bytes::len).sum());
                for chunk in many {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}
