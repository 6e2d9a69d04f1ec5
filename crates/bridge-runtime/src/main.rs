//! # Offload Bridge
//!
//! Runs the bridge against the loopback firmware: a link statistics query,
//! a cached scan result fetch and one direct-link setup and teardown, then
//! logs the metrics.
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `OB_CONFIG` | Path of the TOML config file (defaults when unset) |
//! | `OB_LOG_LEVEL` | Log filter, see `ob-telemetry` |

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use shared_types::{MacAddr, OperationClass};
use tracing::{info, warn};

use bridge_runtime::{
    BridgeConfig, InMemoryDataplane, LoopbackFirmware, OffloadBridge, RunningBridge,
};
use ob_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::from_env().context("failed to load bridge configuration")?;
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Offload Bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let stations = u16::try_from(config.peer_link.max_peers).unwrap_or(u16::MAX);
    let dataplane = Arc::new(InMemoryDataplane::new(stations));
    let RunningBridge {
        bridge,
        pump,
        firmware,
    } = OffloadBridge::start(&config, dataplane).context("failed to start bridge")?;
    let firmware = LoopbackFirmware::new(config.loopback).spawn(firmware);

    run_demo(&bridge).await?;

    let cleaned = bridge.shutdown();
    info!(cleaned, "Peer links cleaned up");

    match bridge.metrics_text() {
        Ok(text) => info!("Metrics:\n{text}"),
        Err(e) => warn!(error = %e, "Could not render metrics"),
    }

    // Stopping the firmware closes the event queue once its in-flight
    // answers are sent; the delivery thread then drains and exits.
    firmware.abort();
    let _ = firmware.await;
    drop(bridge);
    let delivered = tokio::task::spawn_blocking(move || pump.join())
        .await
        .context("event delivery thread")?;

    info!(delivered, "Offload bridge stopped");
    Ok(())
}

async fn run_demo(bridge: &Arc<OffloadBridge<InMemoryDataplane>>) -> Result<()> {
    let stats = bridge
        .issue_operation_async(OperationClass::LinkStats, Bytes::new(), Duration::from_millis(500))
        .await
        .context("link statistics query")?;
    info!(
        status = stats.status.label(),
        chunks = stats.chunk_count,
        bytes = stats.payload().len(),
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "Link statistics"
    );

    let scans = bridge
        .issue_default_async(OperationClass::ExtScanCachedResults, Bytes::new())
        .await
        .context("cached scan results")?;
    info!(
        status = scans.status.label(),
        chunks = scans.chunk_count,
        truncated = scans.truncated,
        "Cached scan results"
    );

    let peer = MacAddr::new([0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]);
    bridge.peer_setup_async(peer).await.context("peer setup")?;
    info!(
        peer = %peer,
        state = %bridge.peer_state(peer),
        station_index = ?bridge.station_index(peer).ok(),
        "Direct link up"
    );

    bridge.peer_teardown_async(peer).await.context("peer teardown")?;
    info!(peer = %peer, state = %bridge.peer_state(peer), "Direct link down");

    Ok(())
}
