//! Ports for the peer-link subsystem.

pub mod inbound;
pub mod outbound;
