//! The per-peer lifecycle record.

use shared_types::{ErrorKind, MacAddr, StationIndex};

use super::capabilities::PeerCapabilities;
use super::state::{next_state, PeerLinkEvent, PeerLinkState};

/// Direct-link record, keyed by peer address.
///
/// `station_index` and `capabilities` are only populated once the dataplane
/// accepted the registration; they are cleared on the way back to Idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLink {
    pub(crate) addr: MacAddr,
    pub(crate) state: PeerLinkState,
    pub(crate) capabilities: Option<PeerCapabilities>,
    pub(crate) station_index: Option<StationIndex>,
    pub(crate) force_keep: bool,
    /// Id of the latest Idle → Connecting attempt.
    pub(crate) setup_epoch: u64,
    /// Set when the record is removed from the registry.
    pub(crate) retired: bool,
}

impl PeerLink {
    pub fn new(addr: MacAddr) -> Self {
        Self {
            addr,
            state: PeerLinkState::Idle,
            capabilities: None,
            station_index: None,
            force_keep: false,
            setup_epoch: 0,
            retired: false,
        }
    }

    pub fn addr(&self) -> MacAddr {
        self.addr
    }

    pub fn state(&self) -> PeerLinkState {
        self.state
    }

    pub fn force_keep(&self) -> bool {
        self.force_keep
    }

    /// Dataplane handle; only meaningful while Connected.
    pub fn station_index(&self) -> Result<StationIndex, ErrorKind> {
        match (self.state, self.station_index) {
            (PeerLinkState::Connected, Some(index)) => Ok(index),
            _ => Err(ErrorKind::NotConnected),
        }
    }

    pub fn capabilities(&self) -> Result<&PeerCapabilities, ErrorKind> {
        match (self.state, &self.capabilities) {
            (PeerLinkState::Connected, Some(caps)) => Ok(caps),
            _ => Err(ErrorKind::NotConnected),
        }
    }

    /// Apply `event`, returning the previous state.
    pub(crate) fn apply(&mut self, event: PeerLinkEvent) -> Result<PeerLinkState, ErrorKind> {
        let from = self.state;
        self.state = next_state(from, event)?;
        if self.state == PeerLinkState::Idle {
            self.station_index = None;
            self.capabilities = None;
        }
        Ok(from)
    }
}
