//! # Redis Message Bus
//!
//! Scale-out bus that publishes batches through the atomic publish script.
//!
//! Construction spawns two owned tasks:
//!
//! - the reconnect loop: connect, retry after `reconnect_delay` on failure,
//!   call `open_stream(0)` once connected;
//! - the event listener: on `Restored`, wait for the key to be ready and call
//!   `open_stream(0)`.
//!
//! Both are aborted when the bus is disposed or dropped.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use backplane_bus::{check_stream, MemoryPool, NoopStreamHook, ScaleoutBus, StreamHook};
use backplane_telemetry::{
    time_histogram, BATCHES_SENT, MESSAGES_PUBLISHED, PUBLISH_DURATION, PUBLISH_FAILURES,
};
use backplane_types::{BusError, BusResult, Message, ScaleoutBatch, StreamIndex, DEFAULT_STREAM};

use crate::config::RedisScaleoutConfiguration;
use crate::connection::BackplaneConnection;
use crate::domain::{BackplaneScript, ConnectionEvent, PublishReceipt};
use crate::ports::BackplaneConnector;

#[derive(Default)]
struct BusTasks {
    reconnect: Option<JoinHandle<()>>,
    events: Option<JoinHandle<()>>,
}

impl BusTasks {
    fn abort_all(&mut self) {
        if let Some(task) = self.reconnect.take() {
            task.abort();
        }
        if let Some(task) = self.events.take() {
            task.abort();
        }
    }
}

pub struct RedisMessageBus {
    config: RedisScaleoutConfiguration,
    connection: Arc<BackplaneConnection>,
    pool: Arc<MemoryPool>,
    tasks: Mutex<BusTasks>,
}

impl RedisMessageBus {
    /// Start the bus. Must be called inside a Tokio runtime.
    pub fn new(
        config: RedisScaleoutConfiguration,
        connection: Arc<BackplaneConnection>,
        hook: Arc<dyn StreamHook>,
        pool: Arc<MemoryPool>,
    ) -> BusResult<Self> {
        config.validate()?;

        // Subscribe before connecting so no notification is missed.
        let events = connection.subscribe();
        let tasks = BusTasks {
            events: Some(tokio::spawn(listen(
                events,
                Arc::clone(&connection),
                Arc::clone(&hook),
                config.database,
                config.event_key.clone(),
            ))),
            reconnect: Some(tokio::spawn(connect_with_retry(
                Arc::clone(&connection),
                hook,
                config.clone(),
            ))),
        };

        info!(
            event_key = %config.event_key,
            database = config.database,
            streams = config.stream_count,
            "Redis message bus started"
        );

        Ok(Self {
            config,
            connection,
            pool,
            tasks: Mutex::new(tasks),
        })
    }

    /// Start a bus over `connector` with a no-op stream hook and a fresh pool.
    pub fn with_connector(
        config: RedisScaleoutConfiguration,
        connector: Arc<dyn BackplaneConnector>,
    ) -> BusResult<Self> {
        let connection = Arc::new(BackplaneConnection::with_poll_interval(
            connector,
            config.restore_poll_interval,
        ));
        Self::new(
            config,
            connection,
            Arc::new(NoopStreamHook),
            Arc::new(MemoryPool::new()),
        )
    }

    #[must_use]
    pub fn config(&self) -> &RedisScaleoutConfiguration {
        &self.config
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<BackplaneConnection> {
        &self.connection
    }

    /// Publish one batch and return the sequence number it was assigned.
    pub async fn publish_batch(
        &self,
        stream_index: StreamIndex,
        messages: &[Message],
    ) -> BusResult<PublishReceipt> {
        check_stream(stream_index, self.config.stream_count)?;

        let len = ScaleoutBatch::encoded_len(messages)?;
        let mut segment = self.pool.alloc_segment(len);
        if let Err(e) = ScaleoutBatch::encode_into(segment.as_mut_slice(), messages) {
            self.pool.free_segment(segment);
            return Err(e);
        }

        let result = {
            let _timer = time_histogram!(PUBLISH_DURATION);
            self.connection
                .script_evaluate(
                    self.config.database,
                    &BackplaneScript::PUBLISH,
                    &self.config.event_key,
                    segment.as_slice(),
                )
                .await
        };
        self.pool.free_segment(segment);

        match result.and_then(PublishReceipt::try_from) {
            Ok(receipt) => {
                MESSAGES_PUBLISHED.inc_by(messages.len() as f64);
                BATCHES_SENT
                    .with_label_values(&[&stream_index.to_string()])
                    .inc();
                trace!(
                    sequence = receipt.sequence,
                    messages = messages.len(),
                    bytes = receipt.message_bytes.len(),
                    "Published batch"
                );
                Ok(receipt)
            }
            Err(e) => {
                PUBLISH_FAILURES.with_label_values(&[e.kind()]).inc();
                debug!(error = %e, "Publish failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ScaleoutBus for RedisMessageBus {
    fn stream_count(&self) -> usize {
        self.config.stream_count
    }

    async fn send_to_stream(
        &self,
        stream_index: StreamIndex,
        messages: Vec<Message>,
    ) -> BusResult<()> {
        check_stream(stream_index, self.config.stream_count)?;
        if messages.is_empty() {
            return Ok(());
        }
        self.publish_batch(stream_index, &messages).await.map(|_| ())
    }

    async fn shutdown(&self) {
        info!("RedisMessageBus is being disposed");
        // No reconnect or stream reopen may run once disposal starts.
        self.tasks.lock().abort_all();
        self.connection.close(&self.config.event_key, false).await;
    }
}

impl Drop for RedisMessageBus {
    fn drop(&mut self) {
        self.tasks.get_mut().abort_all();
    }
}

async fn connect_with_retry(
    connection: Arc<BackplaneConnection>,
    hook: Arc<dyn StreamHook>,
    config: RedisScaleoutConfiguration,
) {
    loop {
        match connection.connect(&config.connection_string).await {
            Ok(()) => {
                hook.open_stream(DEFAULT_STREAM);
                return;
            }
            Err(BusError::Disposed) => {
                debug!("Connection disposed, reconnect loop stopped");
                return;
            }
            Err(e) => {
                error!(error = %e, "Error connecting to backplane");
            }
        }

        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn listen(
    mut events: broadcast::Receiver<ConnectionEvent>,
    connection: Arc<BackplaneConnection>,
    hook: Arc<dyn StreamHook>,
    database: u32,
    event_key: String,
) {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::Failed { reason }) => {
                info!(
                    reason = reason.as_deref().unwrap_or("connection closed"),
                    "Backplane connection failed"
                );
            }
            Ok(ConnectionEvent::Restored { .. }) => {
                connection
                    .restore_latest_value_for_key(database, &event_key)
                    .await;
                hook.open_stream(DEFAULT_STREAM);
            }
            Ok(ConnectionEvent::Error { message }) => {
                trace!(%message, "Backplane error notification");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed backplane notifications");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
