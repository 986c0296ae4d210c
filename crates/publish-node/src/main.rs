//! # Publish Node
//!
//! Reads lines from stdin and publishes each one to `BP_SIGNAL` through the
//! scale-out backplane.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize telemetry
//! 3. Wire connector, connection, bus and connection manager
//! 4. Publish stdin lines until EOF or Ctrl+C
//! 5. Dispose the bus

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::{info, warn};

use backplane_telemetry::{init_telemetry, TelemetryConfig};
use publish_node::{build_publisher, publish_lines, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to load configuration")?;

    let mut telemetry = TelemetryConfig::from_env();
    if std::env::var("BP_SERVICE_NAME").is_err() {
        telemetry.service_name = "publish-node".into();
    }
    let _telemetry = init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Backplane Publish Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        backend = ?config.backend,
        event_key = %config.event_key,
        database = config.database,
        signal = %config.signal,
        "Starting publisher"
    );

    let stack = build_publisher(&config).context("Failed to wire publish stack")?;
    let connection = stack.manager.get_connection(config.signal.clone());
    let stdin = BufReader::new(tokio::io::stdin());

    let outcome = tokio::select! {
        result = publish_lines(stdin, &connection, &config.signal) => {
            result.context("Failed to read stdin").map(|stats| {
                info!(published = stats.published, failed = stats.failed, "Input closed");
            })
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received");
            Ok(())
        }
    };

    stack.shutdown().await;
    info!("Publish node stopped");
    outcome
}
