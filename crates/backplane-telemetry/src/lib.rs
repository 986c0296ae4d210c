//! # Backplane Telemetry
//!
//! Observability for processes publishing through the scale-out backplane.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an env filter, pretty console output
//!   in development and JSON output in containers.
//! - **Traces**: optional OpenTelemetry OTLP export.
//! - **Metrics**: Prometheus counters for publishes, connection lifecycle and
//!   buffer pool usage.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use backplane_telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP endpoint, export disabled when unset |
//! | `BP_SERVICE_NAME` | `backplane` | Service name in traces |
//! | `BP_INSTANCE_ID` | `0` | Instance identifier |
//! | `BP_LOG_LEVEL` | `info` | Log level filter |
//! | `BP_CONSOLE_OUTPUT` | `true` | Console log output |
//! | `BP_JSON_LOGS` | `false`, `true` in containers | JSON log output |
//! | `BP_METRICS_ENABLED` | `true` | Register Prometheus metrics |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, BATCHES_SENT, BUFFER_POOL_RENTS,
    CONNECTION_EVENTS, CONNECTION_STATE, CONNECT_ATTEMPTS, MESSAGES_PUBLISHED, PUBLISH_DURATION,
    PUBLISH_FAILURES,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging, optional trace export and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, it flushes pending traces.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let tracing_guard = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Config("bad filter".into());
        assert_eq!(err.to_string(), "Invalid configuration: bad filter");
    }
}
