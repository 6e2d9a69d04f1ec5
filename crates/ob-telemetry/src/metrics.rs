//! Prometheus metrics for the offload bridge.
//!
//! All metrics follow the naming convention: `ob_<subsystem>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: operations issued, late events dropped, link transitions
//! - **Gauge**: currently active peer links
//! - **Histogram**: dispatch round-trip duration

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCH METRICS (ob-01)
    // =========================================================================

    /// Operations by class and outcome
    pub static ref DISPATCH_OPERATIONS: CounterVec = CounterVec::new(
        Opts::new("ob_dispatch_operations_total", "Offload operations by class and outcome"),
        &["class", "outcome"]  // outcome: success/failed/busy/dispatch_rejected/timeout
    ).expect("metric creation failed");

    /// Events the aggregator dropped
    pub static ref LATE_EVENTS_DROPPED: CounterVec = CounterVec::new(
        Opts::new(
            "ob_dispatch_late_events_dropped_total",
            "Control events dropped by the result aggregator"
        ),
        &["class", "reason"]  // reason: no_live_token/token_mismatch/discarded_after_timeout
    ).expect("metric creation failed");

    /// Issue-to-completion duration
    pub static ref OPERATION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ob_dispatch_operation_duration_seconds",
            "Time from forwarding a request to its terminal chunk"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("bucket layout")),
        &["class"]
    ).expect("metric creation failed");

    // =========================================================================
    // PEER LINK METRICS (ob-02)
    // =========================================================================

    /// Committed peer-link state changes
    pub static ref PEER_LINK_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("ob_peer_link_transitions_total", "Peer link state transitions"),
        &["from", "to"]
    ).expect("metric creation failed");

    /// Peer links outside Idle
    pub static ref PEER_LINKS_ACTIVE: Gauge = Gauge::new(
        "ob_peer_links_active",
        "Number of peer links holding a slot"
    ).expect("metric creation failed");

    // =========================================================================
    // EVENT DELIVERY METRICS
    // =========================================================================

    /// Inbound events processed by the delivery thread
    pub static ref EVENTS_DELIVERED: CounterVec = CounterVec::new(
        Opts::new("ob_events_delivered_total", "Inbound events processed by the event pump"),
        &["kind"]
    ).expect("metric creation failed");
}

/// Handle proving the metrics are registered
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    _registry: Registry,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Dispatch
        Box::new(DISPATCH_OPERATIONS.clone()),
        Box::new(LATE_EVENTS_DROPPED.clone()),
        Box::new(OPERATION_DURATION.clone()),
        // Peer links
        Box::new(PEER_LINK_TRANSITIONS.clone()),
        Box::new(PEER_LINKS_ACTIVE.clone()),
        // Event delivery
        Box::new(EVENTS_DELIVERED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: REGISTRY.clone(),
    })
}

/// Render all metrics in the Prometheus text exposition format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record one finished dispatch.
pub fn record_operation(class: &str, outcome: &str, elapsed: Option<Duration>) {
    DISPATCH_OPERATIONS.with_label_values(&[class, outcome]).inc();
    if let Some(elapsed) = elapsed {
        OPERATION_DURATION
            .with_label_values(&[class])
            .observe(elapsed.as_secs_f64());
    }
}

/// Record one dropped control event.
pub fn record_dropped_event(class: &str, reason: &str) {
    LATE_EVENTS_DROPPED.with_label_values(&[class, reason]).inc();
}

/// Record one peer-link transition and the resulting active count.
pub fn record_peer_transition(from: &str, to: &str, active: usize) {
    PEER_LINK_TRANSITIONS.with_label_values(&[from, to]).inc();
    PEER_LINKS_ACTIVE.set(active as f64);
}

/// Record one inbound event taken off the delivery queue.
pub fn record_event_delivered(kind: &str) {
    EVENTS_DELIVERED.with_label_values(&[kind]).inc();
}
