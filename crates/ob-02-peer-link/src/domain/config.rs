//! Peer-link configuration.

use std::time::Duration;

use super::capabilities::PeerCapabilities;

/// Peer-link service configuration
#[derive(Debug, Clone)]
pub struct PeerLinkConfig {
    /// Maximum concurrent non-Idle peers
    pub max_peers: usize,
    /// Bound on one capability exchange round trip
    pub capability_exchange_timeout: Duration,
    /// Capabilities advertised to peers
    pub local_capabilities: PeerCapabilities,
}

impl Default for PeerLinkConfig {
    fn default() -> Self {
        Self {
            max_peers: 4,
            capability_exchange_timeout: Duration::from_millis(800),
            local_capabilities: PeerCapabilities {
                responder: false,
                ps_queue_mask: 0x0f,
                max_service_period: 0,
                buffer_sta: true,
                off_channel: false,
                supported_channels: vec![1, 6, 11, 36, 40, 44, 48],
                operating_classes: vec![81, 115],
            },
        }
    }
}

impl PeerLinkConfig {
    /// Testing config with smaller limits
    pub fn for_testing() -> Self {
        Self {
            max_peers: 2,
            capability_exchange_timeout: Duration::from_millis(100),
            ..Self::default()
        }
    }
}
