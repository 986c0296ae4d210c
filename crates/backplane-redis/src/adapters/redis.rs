//! Redis adapter.
//!
//! One `redis::Client` + `ConnectionManager` per database index, the
//! database applied to the URL path. Scripts run through `redis::Script`
//! (EVALSHA with load fallback). A heartbeat task PINGs the server and turns
//! state transitions into [`ConnectionEvent`]s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use backplane_types::{BusError, BusResult};

use crate::domain::{BackplaneScript, ConnectionEvent, ScriptValue};
use crate::ports::{BackplaneConnector, Multiplexer};

/// Interval between heartbeat PINGs.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 64;

/// Opens Redis connections from a `redis://` URL or a bare `host:port`.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    heartbeat_interval: Duration,
}

impl Default for RedisConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl RedisConnector {
    pub fn new() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

#[async_trait]
impl BackplaneConnector for RedisConnector {
    async fn connect(&self, connection_string: &str) -> BusResult<Arc<dyn Multiplexer>> {
        let base = parse_connection_string(connection_string)?;
        let database = database_from_url(&base)?;
        let manager = open_manager(&base, database).await?;

        info!(host = base.host_str().unwrap_or("<none>"), database, "Connected to Redis");

        let multiplexer = Arc::new(RedisMultiplexer::new(
            base,
            HashMap::from([(database, manager.clone())]),
        ));

        let heartbeat = spawn_heartbeat(
            manager,
            self.heartbeat_interval,
            Arc::clone(&multiplexer.connected),
            multiplexer.events.clone(),
        );
        *multiplexer.heartbeat.lock() = Some(heartbeat);

        Ok(multiplexer)
    }
}

struct RedisMultiplexer {
    base: Url,
    managers: Mutex<HashMap<u32, ConnectionManager>>,
    scripts: Mutex<HashMap<&'static str, redis::Script>>,
    events: broadcast::Sender<ConnectionEvent>,
    connected: Arc<AtomicBool>,
    closed: AtomicBool,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl RedisMultiplexer {
    fn new(base: Url, managers: HashMap<u32, ConnectionManager>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            base,
            managers: Mutex::new(managers),
            scripts: Mutex::new(HashMap::new()),
            events,
            connected: Arc::new(AtomicBool::new(true)),
            closed: AtomicBool::new(false),
            heartbeat: Mutex::new(None),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Connection for `database`, opened on first use. Never reopens after
    /// `close`.
    async fn manager(&self, database: u32) -> BusResult<ConnectionManager> {
        if self.is_closed() {
            return Err(BusError::NotStarted);
        }
        if let Some(manager) = self.managers.lock().get(&database) {
            return Ok(manager.clone());
        }

        let manager = open_manager(&self.base, database).await?;
        let mut managers = self.managers.lock();
        // Closed while the connection was opening: drop it.
        if self.is_closed() {
            return Err(BusError::NotStarted);
        }
        Ok(managers.entry(database).or_insert(manager).clone())
    }

    fn script(&self, script: &BackplaneScript) -> redis::Script {
        self.scripts
            .lock()
            .entry(script.name)
            .or_insert_with(|| redis::Script::new(script.source))
            .clone()
    }

    fn report(&self, error: &redis::RedisError) -> BusError {
        let message = error.to_string();
        if let Some(event) = error_notification(is_transport_failure(error), message.clone()) {
            let _ = self.events.send(event);
        }
        BusError::Backplane(message)
    }
}

#[async_trait]
impl Multiplexer for RedisMultiplexer {
    fn is_connected(&self) -> bool {
        !self.is_closed() && self.connected.load(Ordering::SeqCst)
    }

    async fn is_key_ready(&self, database: u32, _key: &str) -> BusResult<bool> {
        if self.is_closed() {
            return Err(BusError::NotStarted);
        }
        if !self.is_connected() {
            return Ok(false);
        }
        let mut manager = self.manager(database).await?;
        Ok(redis::cmd("PING")
            .query_async::<String>(&mut manager)
            .await
            .is_ok())
    }

    async fn script_evaluate(
        &self,
        database: u32,
        script: &BackplaneScript,
        key: &str,
        argument: &[u8],
    ) -> BusResult<ScriptValue> {
        if self.is_closed() {
            return Err(BusError::NotStarted);
        }
        let mut manager = self.manager(database).await?;
        let value = self
            .script(script)
            .key(key)
            .arg(argument)
            .invoke_async::<redis::Value>(&mut manager)
            .await
            .map_err(|e| self.report(&e))?;
        Ok(to_script_value(value))
    }

    async fn close(&self, allow_commands_to_complete: bool) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(heartbeat) = self.heartbeat.lock().take() {
            heartbeat.abort();
        }
        self.connected.store(false, Ordering::SeqCst);

        // In-flight commands hold their own manager clones and finish on
        // their own; dropping ours stops new ones.
        let dropped = std::mem::take(&mut *self.managers.lock()).len();
        debug!(allow_commands_to_complete, dropped, "Closed Redis connection");
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

impl Drop for RedisMultiplexer {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.get_mut().take() {
            heartbeat.abort();
        }
    }
}

fn spawn_heartbeat(
    mut manager: ConnectionManager,
    interval: Duration,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<ConnectionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let failure = redis::cmd("PING")
                .query_async::<String>(&mut manager)
                .await
                .err()
                .map(|e| e.to_string());

            let (now_connected, event) =
                heartbeat_transition(connected.load(Ordering::SeqCst), failure);
            connected.store(now_connected, Ordering::SeqCst);
            if let Some(event) = event {
                if let ConnectionEvent::Failed { reason } = &event {
                    warn!(reason = reason.as_deref().unwrap_or("<none>"), "Redis heartbeat failed");
                }
                let _ = events.send(event);
            }
        }
    })
}

/// Connected flag and notification after one heartbeat, given the previous
/// flag and the PING failure, if any. Only transitions notify.
fn heartbeat_transition(
    was_connected: bool,
    failure: Option<String>,
) -> (bool, Option<ConnectionEvent>) {
    match (was_connected, failure) {
        (false, None) => (true, Some(ConnectionEvent::Restored { reason: None })),
        (true, Some(reason)) => (
            false,
            Some(ConnectionEvent::Failed {
                reason: Some(reason),
            }),
        ),
        (connected, _) => (connected, None),
    }
}

/// I/O errors and dropped connections are reported by the heartbeat.
fn is_transport_failure(error: &redis::RedisError) -> bool {
    error.is_io_error() || error.is_connection_dropped()
}

/// Server-side errors leave the connection up and surface as `Error`.
fn error_notification(transport_failure: bool, message: String) -> Option<ConnectionEvent> {
    (!transport_failure).then_some(ConnectionEvent::Error { message })
}

async fn open_manager(base: &Url, database: u32) -> BusResult<ConnectionManager> {
    let url = database_url(base, database);
    let client = redis::Client::open(url.as_str())
        .map_err(|e| BusError::ConnectFailed(format!("Failed to create Redis client: {e}")))?;
    ConnectionManager::new(client)
        .await
        .map_err(|e| BusError::ConnectFailed(format!("Failed to connect to Redis: {e}")))
}

/// Accept `redis://`/`rediss://` URLs and bare `host:port` strings.
fn parse_connection_string(connection_string: &str) -> BusResult<Url> {
    let candidate = if connection_string.contains("://") {
        connection_string.to_string()
    } else {
        format!("redis://{connection_string}")
    };
    Url::parse(&candidate).map_err(|e| {
        BusError::ConnectFailed(format!("Invalid connection string '{connection_string}': {e}"))
    })
}

/// Database index from the URL path; no path selects database 0.
fn database_from_url(url: &Url) -> BusResult<u32> {
    let path = url.path().trim_start_matches('/');
    if path.is_empty() {
        return Ok(0);
    }
    path.parse().map_err(|_| {
        BusError::ConnectFailed(format!("Invalid database '{path}' in connection string"))
    })
}

fn database_url(base: &Url, database: u32) -> Url {
    let mut url = base.clone();
    url.set_path(&format!("/{database}"));
    url
}

fn to_script_value(value: redis::Value) -> ScriptValue {
    match value {
        redis::Value::Nil => ScriptValue::Nil,
        redis::Value::Int(i) => ScriptValue::Int(i),
        redis::Value::BulkString(bytes) => ScriptValue::Bulk(bytes),
        redis::Value::Array(items) => {
            ScriptValue::Array(items.into_iter().map(to_script_value).collect())
        }
        redis::Value::SimpleString(status) => ScriptValue::Status(status),
        redis::Value::Okay => ScriptValue::Status("OK".into()),
        other => ScriptValue::Other(format!("{other:?}")),
    }
}
