//! # Peer Link Subsystem (ob-02)
//!
//! Lifecycle of direct (TDLS-style) peer-to-peer links: capability
//! exchange, dataplane station registration and teardown.
//!
//! ## State Machine
//!
//! ```text
//!            request_setup                 exchange + register ok
//!   [Idle] ───────────────→ [Connecting] ─────────────────────────→ [Connected]
//!     ↑                          │                                      │
//!     │       failure / timeout  │                 teardown / peer      │
//!     ├──────────────────────────┘                 teardown             ↓
//!     └──────────────── unregistration confirmed ──────────────── [Tearing]
//! ```
//!
//! ## Guarantees
//!
//! - At most one record per peer address
//! - `station_index` is readable only while Connected
//! - The peer ceiling is checked before Idle → Connecting
//! - Every setup failure ends in Idle with no dataplane registration left

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::inbound::{PeerLinkApi, PeerLinkNotifications};
pub use ports::outbound::{CapabilityExchange, DataplaneRegistry, TransitionObserver};
pub use service::PeerLinkService;
