//! Outbound (driven) ports: the key-value/pub-sub store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use backplane_types::BusResult;

use crate::domain::{BackplaneScript, ConnectionEvent, ScriptValue};

/// Opens store connections.
///
/// The connection string is opaque to the backplane and interpreted by the
/// implementation only.
#[async_trait]
pub trait BackplaneConnector: Send + Sync {
    async fn connect(&self, connection_string: &str) -> BusResult<Arc<dyn Multiplexer>>;
}

/// A live store connection shared by every database index.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Whether the connection is currently usable.
    fn is_connected(&self) -> bool;

    /// Whether commands for `key` on `database` can be served right now.
    async fn is_key_ready(&self, database: u32, key: &str) -> BusResult<bool>;

    /// Run `script` atomically with `KEYS[1] = key` and `ARGV[1] = argument`.
    async fn script_evaluate(
        &self,
        database: u32,
        script: &BackplaneScript,
        key: &str,
        argument: &[u8],
    ) -> BusResult<ScriptValue>;

    /// Stop the connection. With `allow_commands_to_complete`, in-flight
    /// commands finish first.
    async fn close(&self, allow_commands_to_complete: bool);

    /// Subscribe to connection notifications.
    fn events(&self) -> broadcast::Receiver<ConnectionEvent>;
}
