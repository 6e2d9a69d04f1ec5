//! # Offload Bridge Runtime
//!
//! Wires the correlation engine (ob-01) and the peer-link service (ob-02)
//! to their adapters and runs the event-delivery thread.
//!
//! ## Modular Structure
//!
//! - `container/` - TOML configuration
//! - `adapters/` - Port implementations (control channel, dataplane,
//!   capability exchange, loopback firmware, metrics observer)
//! - `handlers/` - Event-delivery thread
//! - `bridge` - The `OffloadBridge` facade
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`OB_CONFIG` or defaults)
//! 2. Initialize telemetry
//! 3. Build the dispatcher, the peer-link service and their adapters
//! 4. Start the event-delivery thread
//! 5. Attach the control entity to the firmware port

pub mod adapters;
pub mod bridge;
pub mod container;
pub mod handlers;

pub use adapters::{
    CapabilityFrame, ChannelControlEntity, DispatcherCapabilityExchange, InMemoryDataplane,
    LoopbackFirmware, MetricsTransitionObserver,
};
pub use bridge::{
    BridgeDispatcher, BridgeError, BridgePeerLinks, FirmwarePort, OffloadBridge, RunningBridge,
};
pub use container::{BridgeConfig, ConfigError, EventsConfig, LoopbackConfig};
pub use handlers::{Delivery, EventPump, InboundEvent};
