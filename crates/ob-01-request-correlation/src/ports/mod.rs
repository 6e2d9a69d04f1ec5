//! Ports for the request correlation subsystem.

pub mod inbound;
pub mod outbound;
