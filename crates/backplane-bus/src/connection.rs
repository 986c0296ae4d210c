//! # Publishing Facade
//!
//! [`Connection`] turns a caller-facing [`ConnectionMessage`] into one or more
//! bus [`Message`]s. Addressing is validated before anything touches the bus.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use backplane_types::{BusError, BusResult, ConnectionMessage, Message, MessageValue};

use crate::bus::MessageBus;
use crate::memory_pool::MemoryPool;

/// A producer bound to a bus, with its own identity and default signal.
#[derive(Clone)]
pub struct Connection {
    bus: Arc<dyn MessageBus>,
    pool: Arc<MemoryPool>,
    connection_id: String,
    default_signal: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connection_id", &self.connection_id)
            .field("default_signal", &self.default_signal)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        pool: Arc<MemoryPool>,
        connection_id: impl Into<String>,
        default_signal: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            pool,
            connection_id: connection_id.into(),
            default_signal: default_signal.into(),
        }
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    #[must_use]
    pub fn default_signal(&self) -> &str {
        &self.default_signal
    }

    /// Publish a message.
    ///
    /// - `signal` and `signals` both set: [`BusError::AmbiguousMessage`].
    /// - `signals` set: one message per signal, serialized once. An empty
    ///   list resolves without touching the bus.
    /// - otherwise: one message to `signal`, or to the default signal when
    ///   none is given. `wait_for_ack` fails with [`BusError::AckNotSupported`].
    pub async fn send(&self, message: ConnectionMessage) -> BusResult<()> {
        message.validate()?;

        if let Some(signals) = message.signals.as_deref() {
            return self.send_to_many(signals, &message).await;
        }

        if message.wait_for_ack {
            return Err(BusError::AckNotSupported);
        }

        let signal = message
            .signal
            .as_deref()
            .filter(|signal| !signal.is_empty())
            .unwrap_or(&self.default_signal);
        let value = self.serialize(&message.value)?;

        self.bus.publish(self.build(signal, value, &message)).await
    }

    async fn send_to_many(&self, signals: &[String], message: &ConnectionMessage) -> BusResult<()> {
        if signals.is_empty() {
            debug!(connection_id = %self.connection_id, "No signals to publish to");
            return Ok(());
        }

        let value = self.serialize(&message.value)?;
        let publishes = signals
            .iter()
            .map(|signal| self.bus.publish(self.build(signal, value.clone(), message)));

        try_join_all(publishes).await.map(|_| ()).map_err(|e| {
            warn!(
                connection_id = %self.connection_id,
                signals = signals.len(),
                error = %e,
                "Multi-signal publish failed"
            );
            e
        })
    }

    fn build(&self, signal: &str, value: Vec<u8>, message: &ConnectionMessage) -> Message {
        let built = Message::new(self.connection_id.as_str(), signal, value);
        match message.filter() {
            Some(filter) => built.with_filter(filter),
            None => built,
        }
    }

    fn serialize(&self, value: &MessageValue) -> BusResult<Vec<u8>> {
        match value {
            MessageValue::Serialized(bytes) => Ok(bytes.clone()),
            MessageValue::Json(json) => {
                let mut writer = self.pool.writer();
                serde_json::to_writer(&mut writer, json)?;
                Ok(writer.finish())
            }
        }
    }
}
