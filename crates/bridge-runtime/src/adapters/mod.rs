//! # Adapter Implementations
//!
//! Concrete implementations of the subsystems' outbound ports:
//!
//! | Adapter | Port | Subsystem |
//! |---------|------|-----------|
//! | `ChannelControlEntity` | `ControlEntity` | ob-01 |
//! | `DispatcherCapabilityExchange` | `CapabilityExchange` | ob-02 |
//! | `InMemoryDataplane` | `DataplaneRegistry` | ob-02 |
//! | `MetricsTransitionObserver` | `TransitionObserver` | ob-02 |
//!
//! `LoopbackFirmware` sits on the far side of the request queue and plays
//! the control entity.

pub mod capability_exchange;
pub mod control_channel;
pub mod dataplane;
pub mod loopback_firmware;
pub mod metrics_observer;

pub use capability_exchange::*;
pub use control_channel::*;
pub use dataplane::*;
pub use loopback_firmware::*;
pub use metrics_observer::*;
