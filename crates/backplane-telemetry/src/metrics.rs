//! Prometheus metrics for the backplane.
//!
//! All metrics follow the naming convention: `backplane_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_published_total)
//! - **Gauge**: Value that can go up or down (e.g., connection_state)
//! - **Histogram**: Distribution of values (e.g., publish_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PUBLISH PATH
    // =========================================================================

    /// Messages accepted by the backplane script
    pub static ref MESSAGES_PUBLISHED: Counter = Counter::new(
        "backplane_messages_published_total",
        "Total number of messages published to the backplane"
    ).expect("metric creation failed");

    /// Batches sent, by stream
    pub static ref BATCHES_SENT: CounterVec = CounterVec::new(
        Opts::new("backplane_batches_sent_total", "Batches sent to the backplane"),
        &["stream"]
    ).expect("metric creation failed");

    /// Failed publishes, by error kind
    pub static ref PUBLISH_FAILURES: CounterVec = CounterVec::new(
        Opts::new("backplane_publish_failures_total", "Failed publish attempts"),
        &["reason"]
    ).expect("metric creation failed");

    /// Script round-trip duration
    pub static ref PUBLISH_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "backplane_publish_duration_seconds",
            "Time spent evaluating the publish script"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================

    /// Connect attempts, by outcome
    pub static ref CONNECT_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("backplane_connect_attempts_total", "Backplane connect attempts"),
        &["outcome"]  // outcome: success/failed/discarded
    ).expect("metric creation failed");

    /// Notifications forwarded from the store client
    pub static ref CONNECTION_EVENTS: CounterVec = CounterVec::new(
        Opts::new("backplane_connection_events_total", "Connection notifications"),
        &["kind"]  // kind: failed/restored/error
    ).expect("metric creation failed");

    /// Current connection state (0 unconnected .. 4 disposed)
    pub static ref CONNECTION_STATE: Gauge = Gauge::new(
        "backplane_connection_state",
        "Lifecycle state of the backplane connection"
    ).expect("metric creation failed");

    // =========================================================================
    // BUFFER POOL
    // =========================================================================

    /// Buffer rentals, by element type, tier and outcome
    pub static ref BUFFER_POOL_RENTS: CounterVec = CounterVec::new(
        Opts::new("backplane_buffer_pool_rents_total", "Buffer pool rentals"),
        &["element", "tier", "outcome"]  // outcome: reused/allocated/oversized
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Publish path
        Box::new(MESSAGES_PUBLISHED.clone()),
        Box::new(BATCHES_SENT.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
        Box::new(PUBLISH_DURATION.clone()),
        // Connection
        Box::new(CONNECT_ATTEMPTS.clone()),
        Box::new(CONNECTION_EVENTS.clone()),
        Box::new(CONNECTION_STATE.clone()),
        // Buffer pool
        Box::new(BUFFER_POOL_RENTS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // May fail if another test registered first, which is fine
        let _ = register_metrics();
    }

    #[test]
    fn test_counter_vec_increment() {
        PUBLISH_FAILURES.with_label_values(&["not_started"]).inc();
        assert!(PUBLISH_FAILURES.with_label_values(&["not_started"]).get() >= 1.0);
    }

    #[test]
    fn test_gauge_set() {
        CONNECTION_STATE.set(2.0);
        assert_eq!(CONNECTION_STATE.get(), 2.0);
    }

    #[test]
    fn test_histogram_timer() {
        let before = PUBLISH_DURATION.get_sample_count();
        {
            let _timer = time_histogram!(PUBLISH_DURATION);
        }
        assert!(PUBLISH_DURATION.get_sample_count() > before);
    }
}
