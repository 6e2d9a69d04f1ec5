//! Peer-link result and statistics types.

use std::sync::atomic::{AtomicU64, Ordering};

/// What `request_setup` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStart {
    /// Idle → Connecting; the caller must finish with `complete_setup`.
    Started,
    /// Another setup is already running; nothing to do.
    AlreadyConnecting,
    /// Link already up; nothing to do.
    AlreadyConnected,
}

/// Implicit teardown triggers, all suppressed by `force_keep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplicitTeardownReason {
    /// No traffic on the direct link for too long.
    Inactivity,
    /// The station lost its association on the base channel.
    BaseChannelLost,
    /// Link quality fell below the usable threshold.
    PoorLinkQuality,
}

impl ImplicitTeardownReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            ImplicitTeardownReason::Inactivity => "inactivity",
            ImplicitTeardownReason::BaseChannelLost => "base_channel_lost",
            ImplicitTeardownReason::PoorLinkQuality => "poor_link_quality",
        }
    }
}

/// Counters kept by the peer-link service.
#[derive(Debug, Default)]
pub struct PeerLinkCounters {
    pub setups_started: AtomicU64,
    pub setups_completed: AtomicU64,
    pub setups_failed: AtomicU64,
    pub capacity_rejections: AtomicU64,
    pub teardowns: AtomicU64,
    pub implicit_suppressed: AtomicU64,
    pub unregistration_failures: AtomicU64,
}

impl PeerLinkCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of the peer-link service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerLinkStats {
    pub active: usize,
    pub max_peers: usize,
    pub tracked: usize,
    pub setups_started: u64,
    pub setups_completed: u64,
    pub setups_failed: u64,
    pub capacity_rejections: u64,
    pub teardowns: u64,
    pub implicit_suppressed: u64,
    pub unregistration_failures: u64,
}

impl PeerLinkStats {
    pub(crate) fn from_counters(
        counters: &PeerLinkCounters,
        active: usize,
        max_peers: usize,
        tracked: usize,
    ) -> Self {
        Self {
            active,
            max_peers,
            tracked,
            setups_started: counters.setups_started.load(Ordering::Relaxed),
            setups_completed: counters.setups_completed.load(Ordering::Relaxed),
            setups_failed: counters.setups_failed.load(Ordering::Relaxed),
            capacity_rejections: counters.capacity_rejections.load(Ordering::Relaxed),
            teardowns: counters.teardowns.load(Ordering::Relaxed),
            implicit_suppressed: counters.implicit_suppressed.load(Ordering::Relaxed),
            unregistration_failures: counters.unregistration_failures.load(Ordering::Relaxed),
        }
    }
}
