//! Outbound ports (SPI) for the peer-link service.

use shared_types::{ErrorKind, MacAddr, StationIndex};
use std::time::Duration;

use crate::domain::{PeerCapabilities, PeerLinkState};

/// Dataplane station registration service.
pub trait DataplaneRegistry: Send + Sync {
    /// Register `peer` as a transmit/receive endpoint.
    fn register(&self, peer: MacAddr, capabilities: &PeerCapabilities)
        -> Result<StationIndex, String>;

    /// Remove a previously registered station.
    fn unregister(&self, station_index: StationIndex) -> Result<(), String>;

    /// Push renegotiated capabilities for an already registered station.
    fn update_station(
        &self,
        _station_index: StationIndex,
        _capabilities: &PeerCapabilities,
    ) -> Result<(), String> {
        Ok(())
    }
}

/// Capability round trip with the peer's control-plane entity.
pub trait CapabilityExchange: Send + Sync {
    /// Send `local` to `peer` and wait at most `timeout` for its answer.
    ///
    /// # Errors
    /// - `Timeout` when the peer did not answer in time
    /// - `Firmware` when the control frame exchange failed
    /// - `CapabilityExchangeFailed` when the answer is unusable
    fn exchange(
        &self,
        peer: MacAddr,
        local: &PeerCapabilities,
        timeout: Duration,
    ) -> Result<PeerCapabilities, ErrorKind>;
}

/// Notified after every committed state change.
///
/// Called with the per-peer lock held; implementations must not call back
/// into the peer-link service.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, peer: MacAddr, from: PeerLinkState, to: PeerLinkState, active: usize);
}
