//! Structured logging helpers.
//!
//! Every log line about an operation or a peer carries the same field names
//! so log queries can join on them:
//! - `subsystem`: emitting subsystem (dispatch, peer_link, runtime)
//! - `class`: operation class, for operation events
//! - `token`: correlation token, for operation events
//! - `peer`: peer hardware address, for peer events

/// Log an operation event with standard fields.
///
/// ```rust,ignore
/// log_op_event!(info, "dispatch", "Operation completed", class, token, elapsed_ms = 12);
/// ```
#[macro_export]
macro_rules! log_op_event {
    ($level:ident, $subsystem:expr, $msg:expr, $class:expr, $token:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            class = %$class,
            token = %$token,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a peer-related event with standard fields.
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $subsystem:expr, $msg:expr, $peer:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            peer = %$peer,
            $($($field)*,)?
            $msg
        )
    };
}
