//! Line-oriented publisher: each non-empty input line is published as a JSON
//! string to one signal. Failures are logged and counted, never fatal.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use backplane_bus::Connection;
use backplane_types::ConnectionMessage;

/// Outcome of a publishing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub failed: u64,
}

/// Publish every line of `reader` to `signal` until EOF.
pub async fn publish_lines<R>(
    reader: R,
    connection: &Connection,
    signal: &str,
) -> std::io::Result<PublishStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = PublishStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let message = ConnectionMessage::to_signal(signal, serde_json::Value::from(line));
        match connection.send(message).await {
            Ok(()) => {
                stats.published += 1;
                debug!(%signal, bytes = line.len(), "Published line");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(%signal, error = %e, "Failed to publish line");
            }
        }
    }

    Ok(stats)
}
