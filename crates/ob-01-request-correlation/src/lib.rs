//! # Request Correlation Subsystem (ob-01)
//!
//! Correlates asynchronous, possibly multi-part and possibly lost firmware
//! responses back to the caller that issued the request, with bounded waits.
//!
//! ## Architecture Role
//!
//! ```text
//! [Caller] ──issue(class, payload)──→ [AsyncDispatcher] ──forward(token)──→ [Control Entity]
//!     ↑                                      │                                     │
//!     └────────── completion ────── [RequestContext] ←── on_event ── [ResultAggregator]
//!                                                                          ↑
//!                                                          event-delivery thread
//! ```
//!
//! ## Guarantees
//!
//! - One live token per operation class; a second issue while a wait is
//!   pending fails with `Busy`
//! - Completion fires at most once per arm cycle, and never while the last
//!   chunk carried the more-data flag
//! - After a timeout, late events for the old token are dropped and counted

pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use domain::*;
pub use events::{ControlEvent, ForwardedRequest, OperationOutcome};
pub use ports::inbound::{ControlEventSink, OffloadOperationApi};
pub use ports::outbound::{ControlEntity, ForwardRejection};
pub use service::AsyncDispatcher;
