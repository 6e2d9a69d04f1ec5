//! Inbound ports (API) for request correlation.

use bytes::Bytes;
use shared_types::{ErrorKind, OperationClass};
use std::time::Duration;

use crate::domain::{ContextSnapshot, EventDisposition};
use crate::events::{ControlEvent, OperationOutcome};

/// Caller-facing API of the correlation engine.
pub trait OffloadOperationApi: Send + Sync {
    /// Run one dispatch / wait / correlate cycle for `class`.
    ///
    /// Blocks the calling thread for at most `timeout`.
    ///
    /// # Errors
    /// - `Busy` if an operation of this class is still being waited on
    /// - `DispatchRejected` if the control entity refused the hand-off
    /// - `Timeout` if no terminal chunk arrived in time
    fn issue(
        &self,
        class: OperationClass,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<OperationOutcome, ErrorKind>;

    /// Same as `issue`, using the configured timeout for `class`.
    fn issue_default(
        &self,
        class: OperationClass,
        payload: Bytes,
    ) -> Result<OperationOutcome, ErrorKind>;

    /// Diagnostic view of the context for `class`.
    fn snapshot(&self, class: OperationClass) -> ContextSnapshot;
}

/// Event-delivery entry point, driven by the control entity's event stream.
///
/// Implementations must not block beyond a short context lock.
pub trait ControlEventSink: Send + Sync {
    fn deliver(&self, event: ControlEvent) -> EventDisposition;
}
