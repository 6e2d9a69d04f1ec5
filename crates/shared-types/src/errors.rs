//! # Error Types
//!
//! The error taxonomy returned to callers of the bridge. None of these are
//! retried by the core; retry policy belongs to the caller.

use thiserror::Error;

use crate::entities::{StationIndex, StatusCode};

/// Errors surfaced by the correlation engine and the peer-link state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// Issue on a context whose previous operation is still being waited on.
    #[error("Busy: an operation of this class is already in flight")]
    Busy,

    /// The control entity refused the request synchronously.
    #[error("Dispatch rejected: {reason}")]
    DispatchRejected { reason: String },

    /// No terminal chunk arrived within the bound.
    #[error("Timeout: no terminal result within the wait bound")]
    Timeout,

    /// The configured maximum of concurrent peers is reached.
    #[error("Capacity exceeded: {max} concurrent peers already active")]
    CapacityExceeded { max: usize },

    /// The dataplane refused to register the station.
    #[error("Dataplane registration failed: {reason}")]
    DataplaneRegistrationFailed { reason: String },

    /// The operation requires a Connected peer link.
    #[error("Peer not connected")]
    NotConnected,

    /// The control entity completed the operation with a failure code.
    #[error("Firmware reported failure status {code}")]
    Firmware { code: StatusCode },

    /// The peer answered the capability exchange with something unusable.
    #[error("Capability exchange failed: {reason}")]
    CapabilityExchangeFailed { reason: String },

    /// The dataplane refused to unregister a station.
    #[error("Dataplane unregistration failed for station {station_index}")]
    DataplaneUnregistrationFailed { station_index: StationIndex },

    /// The peer-link transition table does not allow this event here.
    #[error("Invalid transition: {event} not allowed from {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },
}

impl ErrorKind {
    /// Short stable label used for metrics and structured logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::DispatchRejected { .. } => "dispatch_rejected",
            Self::Timeout => "timeout",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::DataplaneRegistrationFailed { .. } => "dataplane_registration_failed",
            Self::NotConnected => "not_connected",
            Self::Firmware { .. } => "firmware",
            Self::CapabilityExchangeFailed { .. } => "capability_exchange_failed",
            Self::DataplaneUnregistrationFailed { .. } => "dataplane_unregistration_failed",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = ErrorKind::CapacityExceeded { max: 4 };
        assert_eq!(
            err.to_string(),
            "Capacity exceeded: 4 concurrent peers already active"
        );

        let err = ErrorKind::InvalidTransition {
            from: "tearing",
            event: "request_setup",
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: request_setup not allowed from tearing"
        );
    }

    #[test]
    fn test_labels_are_distinct() {
        let all = [
            ErrorKind::Busy,
            ErrorKind::DispatchRejected { reason: String::new() },
            ErrorKind::Timeout,
            ErrorKind::CapacityExceeded { max: 1 },
            ErrorKind::DataplaneRegistrationFailed { reason: String::new() },
            ErrorKind::NotConnected,
            ErrorKind::Firmware { code: -5 },
            ErrorKind::CapabilityExchangeFailed { reason: String::new() },
            ErrorKind::DataplaneUnregistrationFailed {
                station_index: StationIndex(1),
            },
            ErrorKind::InvalidTransition { from: "a", event: "b" },
        ];
        let mut labels: Vec<_> = all.iter().map(ErrorKind::label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), all.len());
    }
}
