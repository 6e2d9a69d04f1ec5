//! Inbound ports (API) for the peer-link service.

use shared_types::{ErrorKind, MacAddr, StationIndex};

use crate::domain::{ImplicitTeardownReason, PeerCapabilities, PeerLinkState, PeerLinkStats};

/// Caller-facing peer-link lifecycle API.
pub trait PeerLinkApi: Send + Sync {
    /// Bring the direct link to `peer` up.
    ///
    /// Idempotent while Connecting or Connected.
    ///
    /// # Errors
    /// - `CapacityExceeded` when `max_peers` links are already active
    /// - `InvalidTransition` while the link is still being torn down
    /// - any capability exchange error, or `DataplaneRegistrationFailed`;
    ///   the link is back at Idle in every failure case
    fn peer_setup(&self, peer: MacAddr) -> Result<(), ErrorKind>;

    /// Tear the direct link to `peer` down.
    ///
    /// # Errors
    /// - `NotConnected` when the link is Idle or still Connecting
    /// - `DataplaneUnregistrationFailed`; the link stays in Tearing and a
    ///   repeated call retries
    fn peer_teardown(&self, peer: MacAddr) -> Result<(), ErrorKind>;

    /// Current state; unknown peers are Idle.
    fn peer_state(&self, peer: MacAddr) -> PeerLinkState;

    /// Dataplane handle of a Connected peer.
    fn station_index(&self, peer: MacAddr) -> Result<StationIndex, ErrorKind>;

    /// Negotiated capabilities of a Connected peer.
    fn capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind>;

    /// Renegotiate capabilities of a Connected peer.
    fn update_capabilities(&self, peer: MacAddr) -> Result<PeerCapabilities, ErrorKind>;

    fn set_force_keep(&self, peer: MacAddr, keep: bool);

    fn stats(&self) -> PeerLinkStats;
}

/// Notifications arriving on the event-delivery thread.
pub trait PeerLinkNotifications: Send + Sync {
    /// The peer initiated setup and supplied its capabilities.
    fn on_peer_setup_request(
        &self,
        peer: MacAddr,
        capabilities: PeerCapabilities,
    ) -> Result<(), ErrorKind>;

    /// The peer tore the link down.
    fn on_peer_teardown(&self, peer: MacAddr) -> Result<(), ErrorKind>;

    /// An implicit teardown trigger fired. Returns false when `force_keep`
    /// suppressed it.
    fn on_implicit_teardown(
        &self,
        peer: MacAddr,
        reason: ImplicitTeardownReason,
    ) -> Result<bool, ErrorKind>;
}
