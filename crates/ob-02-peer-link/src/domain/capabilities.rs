//! Negotiated direct-link capability record.

use serde::{Deserialize, Serialize};

/// Highest encodable max service period (2-bit field).
pub const MAX_SERVICE_PERIOD: u8 = 3;

/// Mask of the four access-category power-save queues.
pub const PS_QUEUE_MASK_ALL: u8 = 0x0f;

/// Capabilities exchanged with a peer during setup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerCapabilities {
    /// The peer acts as the link responder.
    pub responder: bool,
    /// Power-save delivery-enabled queues (bit per access category).
    pub ps_queue_mask: u8,
    /// Maximum service period length code.
    pub max_service_period: u8,
    /// Peer supports buffering on behalf of a sleeping station.
    pub buffer_sta: bool,
    /// Peer supports off-channel operation.
    pub off_channel: bool,
    /// Supported channel numbers.
    pub supported_channels: Vec<u8>,
    /// Supported operating classes.
    pub operating_classes: Vec<u8>,
}

impl PeerCapabilities {
    /// Check the fields a peer controls for encodable values.
    pub fn validate(&self) -> Result<(), String> {
        if self.ps_queue_mask & !PS_QUEUE_MASK_ALL != 0 {
            return Err(format!(
                "power-save queue mask 0x{:02x} has bits outside 0x{:02x}",
                self.ps_queue_mask, PS_QUEUE_MASK_ALL
            ));
        }
        if self.max_service_period > MAX_SERVICE_PERIOD {
            return Err(format!(
                "max service period {} exceeds {}",
                self.max_service_period, MAX_SERVICE_PERIOD
            ));
        }
        if self.off_channel && self.operating_classes.is_empty() {
            return Err("off-channel support without operating classes".to_string());
        }
        Ok(())
    }

    /// Channels both sides can use.
    pub fn common_channels(&self, other: &PeerCapabilities) -> Vec<u8> {
        self.supported_channels
            .iter()
            .copied()
            .filter(|ch| other.supported_channels.contains(ch))
            .collect()
    }
}
