//! # Event Handlers
//!
//! The event-delivery thread and the inbound event type it carries.

pub mod event_delivery;

pub use event_delivery::*;
