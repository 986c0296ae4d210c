//! Creates [`Connection`]s that share one bus and one buffer pool.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::bus::MessageBus;
use crate::connection::Connection;
use crate::memory_pool::MemoryPool;

#[derive(Clone)]
pub struct ConnectionManager {
    bus: Arc<dyn MessageBus>,
    pool: Arc<MemoryPool>,
}

impl ConnectionManager {
    pub fn new(bus: Arc<dyn MessageBus>, pool: Arc<MemoryPool>) -> Self {
        Self { bus, pool }
    }

    /// New connection with a fresh UUID v4 identity.
    pub fn get_connection(&self, default_signal: impl Into<String>) -> Connection {
        let connection_id = Uuid::new_v4().to_string();
        let default_signal = default_signal.into();
        debug!(%connection_id, %default_signal, "Created connection");
        Connection::new(
            Arc::clone(&self.bus),
            Arc::clone(&self.pool),
            connection_id,
            default_signal,
        )
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }
}
