//! # Bridge Configuration
//!
//! Unified configuration for the correlation engine, the peer-link service,
//! the event-delivery queue and the loopback firmware.
//!
//! Every field is optional in the file; missing fields take the defaults of
//! the subsystem configs.
//!
//! ```toml
//! [dispatch]
//! default_timeout_ms = 1000
//! max_result_bytes = 262144
//!
//! [dispatch.timeouts_ms]
//! ext_scan_cached_results = 2000
//! link_stats = 500
//!
//! [peer_link]
//! max_peers = 4
//! capability_exchange_timeout_ms = 800
//!
//! [events]
//! queue_depth = 256
//!
//! [loopback]
//! latency_ms = 5
//! jitter_ms = 2
//! ```

use ob_01_request_correlation::DispatchConfig;
use ob_02_peer_link::{PeerCapabilities, PeerLinkConfig};
use serde::Deserialize;
use shared_types::OperationClass;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "OB_CONFIG";

/// Default depth of the request and event queues.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Complete bridge configuration.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Correlation engine timeouts and bounds.
    pub dispatch: DispatchConfig,
    /// Peer-link ceiling, exchange bound and local capabilities.
    pub peer_link: PeerLinkConfig,
    /// Event-delivery queue.
    pub events: EventsConfig,
    /// Simulated firmware behaviour.
    pub loopback: LoopbackConfig,
}

/// Queue sizing for the control-entity and event channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventsConfig {
    pub queue_depth: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Latency model of the loopback firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackConfig {
    pub latency: Duration,
    pub jitter: Duration,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(5),
            jitter: Duration::from_millis(2),
        }
    }
}

// =============================================================================
// FILE FORMAT
// =============================================================================

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    dispatch: DispatchSection,
    #[serde(default)]
    peer_link: PeerLinkSection,
    #[serde(default)]
    events: EventsSection,
    #[serde(default)]
    loopback: LoopbackSection,
}

#[derive(Debug, Deserialize, Default)]
struct DispatchSection {
    default_timeout_ms: Option<u64>,
    max_result_bytes: Option<usize>,
    #[serde(default)]
    timeouts_ms: HashMap<String, u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PeerLinkSection {
    max_peers: Option<usize>,
    capability_exchange_timeout_ms: Option<u64>,
    local_capabilities: Option<PeerCapabilities>,
}

#[derive(Debug, Deserialize, Default)]
struct EventsSection {
    queue_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct LoopbackSection {
    latency_ms: Option<u64>,
    jitter_ms: Option<u64>,
}

impl BridgeConfig {
    /// Load from the file named by `OB_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = Self::default();

        // Dispatch: file overrides are layered over the default per-class table
        let mut dispatch = defaults.dispatch;
        if let Some(ms) = file.dispatch.default_timeout_ms {
            dispatch.default_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = file.dispatch.max_result_bytes {
            dispatch.max_result_bytes = bytes;
        }
        for (name, ms) in file.dispatch.timeouts_ms {
            let class = OperationClass::from_name(&name)
                .ok_or_else(|| ConfigError::UnknownClass(name.clone()))?;
            dispatch.class_timeouts.insert(class, Duration::from_millis(ms));
        }

        let pl = file.peer_link;
        let peer_link = PeerLinkConfig {
            max_peers: pl.max_peers.unwrap_or(defaults.peer_link.max_peers),
            capability_exchange_timeout: pl
                .capability_exchange_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.peer_link.capability_exchange_timeout),
            local_capabilities: pl
                .local_capabilities
                .unwrap_or(defaults.peer_link.local_capabilities),
        };

        let events = EventsConfig {
            queue_depth: file
                .events
                .queue_depth
                .unwrap_or(defaults.events.queue_depth),
        };

        let loopback = LoopbackConfig {
            latency: file
                .loopback
                .latency_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.loopback.latency),
            jitter: file
                .loopback
                .jitter_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.loopback.jitter),
        };

        let config = Self {
            dispatch,
            peer_link,
            events,
            loopback,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.default_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "dispatch.default_timeout_ms must be positive".to_string(),
            ));
        }
        for class in OperationClass::ALL {
            if self.dispatch.timeout_for(class).is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "dispatch.timeouts_ms.{class} must be positive"
                )));
            }
        }
        if self.dispatch.max_result_bytes == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.max_result_bytes must be positive".to_string(),
            ));
        }
        if self.peer_link.max_peers == 0 {
            return Err(ConfigError::Invalid(
                "peer_link.max_peers must be at least 1".to_string(),
            ));
        }
        if self.peer_link.capability_exchange_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "peer_link.capability_exchange_timeout_ms must be positive".to_string(),
            ));
        }
        self.peer_link
            .local_capabilities
            .validate()
            .map_err(|reason| ConfigError::Invalid(format!("peer_link.local_capabilities: {reason}")))?;
        if self.events.queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "events.queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unknown operation class in dispatch.timeouts_ms: {0}")]
    UnknownClass(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
