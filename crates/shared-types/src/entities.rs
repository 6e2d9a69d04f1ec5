//! # Core Entities
//!
//! Identifiers exchanged between the bridge and its collaborators.
//!
//! ## Clusters
//!
//! - **Correlation**: `CorrelationToken`, `OperationClass`, `StatusCode`
//! - **Peers**: `MacAddr`, `StationIndex`

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: CORRELATION
// =============================================================================

/// Opaque identifier carried to the control entity and back.
///
/// Unique only within one request context at a time, never globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(pub u32);

impl CorrelationToken {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<u32> for CorrelationToken {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Firmware-reported completion code. Zero means success.
pub type StatusCode = i32;

/// Status code reported by the control entity for a successful chunk.
pub const STATUS_OK: StatusCode = 0;

/// Operation classes, one request context each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Extended background scan capability query.
    ExtScanCapabilities,
    /// Start extended background scanning.
    ExtScanStart,
    /// Stop extended background scanning.
    ExtScanStop,
    /// Cached extended-scan results (multi-chunk).
    ExtScanCachedResults,
    /// Program the preferred-network list.
    PnoSetList,
    /// Clear the preferred-network list.
    PnoReset,
    /// Batched radio / interface / peer link statistics (multi-chunk).
    LinkStats,
    /// Clear link statistics counters.
    LinkStatsClear,
    /// Direct-link capability round trip with a peer.
    PeerCapabilityExchange,
}

impl OperationClass {
    /// Number of operation classes.
    pub const COUNT: usize = 9;

    /// Every class, in table order.
    pub const ALL: [OperationClass; Self::COUNT] = [
        OperationClass::ExtScanCapabilities,
        OperationClass::ExtScanStart,
        OperationClass::ExtScanStop,
        OperationClass::ExtScanCachedResults,
        OperationClass::PnoSetList,
        OperationClass::PnoReset,
        OperationClass::LinkStats,
        OperationClass::LinkStatsClear,
        OperationClass::PeerCapabilityExchange,
    ];

    /// Position of this class in the context table.
    pub const fn index(self) -> usize {
        match self {
            OperationClass::ExtScanCapabilities => 0,
            OperationClass::ExtScanStart => 1,
            OperationClass::ExtScanStop => 2,
            OperationClass::ExtScanCachedResults => 3,
            OperationClass::PnoSetList => 4,
            OperationClass::PnoReset => 5,
            OperationClass::LinkStats => 6,
            OperationClass::LinkStatsClear => 7,
            OperationClass::PeerCapabilityExchange => 8,
        }
    }

    /// Whether results for this class normally arrive in several chunks.
    pub const fn is_multi_chunk(self) -> bool {
        matches!(
            self,
            OperationClass::ExtScanCachedResults | OperationClass::LinkStats
        )
    }

    /// Stable snake_case name used in logs, metrics labels and config keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationClass::ExtScanCapabilities => "ext_scan_capabilities",
            OperationClass::ExtScanStart => "ext_scan_start",
            OperationClass::ExtScanStop => "ext_scan_stop",
            OperationClass::ExtScanCachedResults => "ext_scan_cached_results",
            OperationClass::PnoSetList => "pno_set_list",
            OperationClass::PnoReset => "pno_reset",
            OperationClass::LinkStats => "link_stats",
            OperationClass::LinkStatsClear => "link_stats_clear",
            OperationClass::PeerCapabilityExchange => "peer_capability_exchange",
        }
    }

    /// Parse a snake_case class name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLUSTER B: PEERS
// =============================================================================

/// 6-byte hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Group (multicast/broadcast) bit of the first octet.
    pub const fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

/// Dataplane handle assigned on station registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationIndex(pub u16);

impl fmt::Display for StationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
