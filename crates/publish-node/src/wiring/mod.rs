//! # Publish Stack Wiring
//!
//! Builds the producer side of the backplane from a [`NodeConfig`]:
//!
//! ```text
//! connector (redis | memory)
//!      │
//!      ↓
//! BackplaneConnection ──→ RedisMessageBus ──→ ConnectionManager
//!                               ↑                   │
//!                          MemoryPool ──────────────┘
//! ```
//!
//! Must be called inside a Tokio runtime; the bus starts connecting right
//! away.

use std::sync::Arc;

use tracing::info;

use backplane_bus::{ConnectionManager, MemoryPool, MessageBus, NoopStreamHook};
use backplane_redis::{
    BackplaneConnection, BackplaneConnector, InMemoryBackplane, InMemoryConnector,
    RedisConnector, RedisMessageBus,
};
use backplane_types::BusResult;

use crate::container::{Backend, NodeConfig};

/// The wired publisher.
pub struct PublishStack {
    pub bus: Arc<RedisMessageBus>,
    pub manager: ConnectionManager,
    /// Set when running on the in-process store.
    pub backplane: Option<Arc<InMemoryBackplane>>,
}

impl PublishStack {
    /// Dispose the bus and its connection.
    pub async fn shutdown(&self) {
        self.bus.dispose().await;
    }
}

/// Wire the publisher for `config`.
pub fn build_publisher(config: &NodeConfig) -> BusResult<PublishStack> {
    let backplane = match config.backend {
        Backend::Redis => None,
        Backend::Memory => Some(Arc::new(InMemoryBackplane::new())),
    };
    let connector: Arc<dyn BackplaneConnector> = match &backplane {
        Some(backplane) => Arc::new(InMemoryConnector::new(Arc::clone(backplane))),
        None => Arc::new(RedisConnector::new()),
    };

    let scaleout = config.scaleout();
    let pool = Arc::new(MemoryPool::new());
    let connection = Arc::new(BackplaneConnection::with_poll_interval(
        connector,
        scaleout.restore_poll_interval,
    ));
    let bus = Arc::new(RedisMessageBus::new(
        scaleout,
        connection,
        Arc::new(NoopStreamHook),
        Arc::clone(&pool),
    )?);
    let manager = ConnectionManager::new(bus.clone(), pool);

    info!(backend = ?config.backend, event_key = %config.event_key, "Publish stack wired");

    Ok(PublishStack {
        bus,
        manager,
        backplane,
    })
}
