//! # Domain Layer for Peer Links
//!
//! The explicit per-peer state machine. No I/O; dataplane and capability
//! exchange are reached through the outbound ports.

mod capabilities;
mod config;
mod link;
mod state;
mod types;

pub use capabilities::{PeerCapabilities, MAX_SERVICE_PERIOD, PS_QUEUE_MASK_ALL};
pub use config::PeerLinkConfig;
pub use link::PeerLink;
pub use state::{next_state, PeerLinkEvent, PeerLinkState};
pub use types::{ImplicitTeardownReason, PeerLinkCounters, PeerLinkStats, SetupStart};
