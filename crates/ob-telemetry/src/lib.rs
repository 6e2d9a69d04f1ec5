//! # Offload-Bridge Telemetry
//!
//! Logging and metrics for the bridge.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` registry with an `EnvFilter` and a pretty
//!   or JSON fmt layer
//! - **Metrics**: Prometheus collectors in a process-wide registry, rendered
//!   with [`gather_text`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ob_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OB_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `OB_JSON_LOGS` | `false` | JSON log lines |
//! | `OB_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `OB_SERVICE_NAME` | `offload-bridge` | Service name in logs |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_text, record_dropped_event, record_event_delivered, record_operation,
    record_peer_transition, register_metrics, MetricsHandle, DISPATCH_OPERATIONS,
    EVENTS_DELIVERED, LATE_EVENTS_DROPPED, OPERATION_DURATION, PEER_LINKS_ACTIVE,
    PEER_LINK_TRANSITIONS,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global subscriber.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_tracing(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
