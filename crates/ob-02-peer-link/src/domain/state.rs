//! Peer-link states and the transition table.

use serde::{Deserialize, Serialize};
use shared_types::ErrorKind;
use std::fmt;

/// Lifecycle state of one direct link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerLinkState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Tearing,
}

impl PeerLinkState {
    pub const fn as_str(self) -> &'static str {
        match self {
            PeerLinkState::Idle => "idle",
            PeerLinkState::Connecting => "connecting",
            PeerLinkState::Connected => "connected",
            PeerLinkState::Tearing => "tearing",
        }
    }

    /// True for every state that holds a peer slot.
    pub const fn is_active(self) -> bool {
        !matches!(self, PeerLinkState::Idle)
    }
}

impl fmt::Display for PeerLinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive a peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerLinkEvent {
    /// Local or peer-initiated setup request.
    RequestSetup,
    /// Capability exchange, control frames and registration all succeeded.
    SetupSucceeded,
    /// Control-frame failure, exchange timeout or registration failure.
    SetupFailed,
    /// Explicit local teardown request.
    Teardown,
    /// Peer-initiated teardown notification.
    PeerTeardown,
    /// The dataplane confirmed unregistration.
    UnregistrationConfirmed,
    /// Subsystem teardown abandoning a half-open or half-closed link.
    ForceCleanup,
}

impl PeerLinkEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            PeerLinkEvent::RequestSetup => "request_setup",
            PeerLinkEvent::SetupSucceeded => "setup_succeeded",
            PeerLinkEvent::SetupFailed => "setup_failed",
            PeerLinkEvent::Teardown => "teardown",
            PeerLinkEvent::PeerTeardown => "peer_teardown",
            PeerLinkEvent::UnregistrationConfirmed => "unregistration_confirmed",
            PeerLinkEvent::ForceCleanup => "force_cleanup",
        }
    }
}

/// Apply `event` to `from`.
///
/// Anything not listed here is rejected with `InvalidTransition`; in
/// particular Idle never reaches Connected directly.
pub fn next_state(from: PeerLinkState, event: PeerLinkEvent) -> Result<PeerLinkState, ErrorKind> {
    use PeerLinkEvent as E;
    use PeerLinkState as S;

    match (from, event) {
        (S::Idle, E::RequestSetup) => Ok(S::Connecting),
        (S::Connecting, E::SetupSucceeded) => Ok(S::Connected),
        (S::Connecting, E::SetupFailed) => Ok(S::Idle),
        (S::Connected, E::Teardown) => Ok(S::Tearing),
        (S::Connected, E::PeerTeardown) => Ok(S::Tearing),
        (S::Tearing, E::UnregistrationConfirmed) => Ok(S::Idle),
        (S::Connecting, E::ForceCleanup) => Ok(S::Idle),
        (S::Tearing, E::ForceCleanup) => Ok(S::Idle),
        (from, event) => Err(ErrorKind::InvalidTransition {
            from: from.as_str(),
            event: event.as_str(),
        }),
    }
}
