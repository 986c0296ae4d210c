//! In-process backplane.
//!
//! Stands in for a Redis server: per-key counters, per-channel broadcast
//! pub/sub and connection notifications. Many connectors can share one
//! [`InMemoryBackplane`] to simulate many processes publishing on one key.
//!
//! The publish script is executed natively and produces the same reply and
//! channel payload as the Lua version. Other scripts are rejected.
//!
//! Fault injection:
//!
//! | Method | Effect |
//! |--------|--------|
//! | `fail_next_connects(n)` | next `n` connects fail |
//! | `simulate_outage()` | store unreachable, `Failed` emitted |
//! | `simulate_restore()` | store reachable, `Restored` emitted |
//! | `set_ready(false)` | keys report not ready |
//! | `emit_error(msg)` | `Error` emitted |
//! | `set_counter(db, key, n)` | counter overwritten |

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use backplane_types::{BusError, BusResult, SequenceNumber, SequencedFrame};

use crate::domain::{BackplaneScript, ConnectionEvent, ScriptValue};
use crate::ports::{BackplaneConnector, Multiplexer};

const CHANNEL_CAPACITY: usize = 1024;
const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct Store {
    /// Counters are per database, like Redis keys.
    counters: HashMap<(u32, String), SequenceNumber>,
    /// Channels span databases, like Redis pub/sub.
    channels: HashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl Store {
    fn channel(&mut self, name: &str) -> &broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
    }
}

/// Shared in-process store.
pub struct InMemoryBackplane {
    store: Mutex<Store>,
    events: broadcast::Sender<ConnectionEvent>,
    online: AtomicBool,
    ready: AtomicBool,
    failing_connects: AtomicUsize,
    connect_attempts: AtomicUsize,
    open_connections: AtomicUsize,
    script_calls: AtomicUsize,
}

impl Default for InMemoryBackplane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackplane {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Mutex::new(Store::default()),
            events,
            online: AtomicBool::new(true),
            ready: AtomicBool::new(true),
            failing_connects: AtomicUsize::new(0),
            connect_attempts: AtomicUsize::new(0),
            open_connections: AtomicUsize::new(0),
            script_calls: AtomicUsize::new(0),
        }
    }

    /// Receive every payload published on `channel`.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Vec<u8>> {
        self.store.lock().channel(channel).subscribe()
    }

    /// Current counter value of `key` in `database`.
    pub fn counter(&self, database: u32, key: &str) -> Option<SequenceNumber> {
        self.store
            .lock()
            .counters
            .get(&(database, key.to_string()))
            .copied()
    }

    /// Overwrite the counter of `key` in `database`, like `SET`.
    pub fn set_counter(&self, database: u32, key: &str, value: SequenceNumber) {
        self.store
            .lock()
            .counters
            .insert((database, key.to_string()), value);
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn simulate_outage(&self) {
        self.online.store(false, Ordering::SeqCst);
        self.emit(ConnectionEvent::Failed {
            reason: Some("simulated outage".into()),
        });
    }

    pub fn simulate_restore(&self) {
        self.online.store(true, Ordering::SeqCst);
        self.emit(ConnectionEvent::Restored { reason: None });
    }

    pub fn emit_error(&self, message: impl Into<String>) {
        self.emit(ConnectionEvent::Error {
            message: message.into(),
        });
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Connect calls seen, including failed ones.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Connections handed out and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Script evaluations received.
    pub fn script_calls(&self) -> usize {
        self.script_calls.load(Ordering::SeqCst)
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ConnectionEvent) {
        // No connections listening is fine.
        let _ = self.events.send(event);
    }

    fn run_publish(&self, database: u32, key: &str, argument: &[u8]) -> BusResult<ScriptValue> {
        let mut store = self.store.lock();
        let counter = store.counters.entry((database, key.to_string())).or_insert(0);
        // INCR refuses to overflow and leaves the key untouched.
        let (sequence, reply) = counter
            .checked_add(1)
            .and_then(|next| Some((next, i64::try_from(next).ok()?)))
            .ok_or_else(|| BusError::Backplane("increment would overflow".into()))?;
        *counter = sequence;

        let payload = SequencedFrame::format(sequence, argument);
        // Publishing with no subscribers is not an error.
        let _ = store.channel(key).send(payload.clone());

        Ok(ScriptValue::Array(vec![
            ScriptValue::Int(reply),
            ScriptValue::Bulk(argument.to_vec()),
            ScriptValue::Bulk(payload),
        ]))
    }
}

/// Connector handing out connections to a shared [`InMemoryBackplane`].
#[derive(Clone)]
pub struct InMemoryConnector {
    backplane: Arc<InMemoryBackplane>,
}

impl InMemoryConnector {
    pub fn new(backplane: Arc<InMemoryBackplane>) -> Self {
        Self { backplane }
    }
}

#[async_trait]
impl BackplaneConnector for InMemoryConnector {
    async fn connect(&self, connection_string: &str) -> BusResult<Arc<dyn Multiplexer>> {
        self.backplane.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self.backplane.failing_connects.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |remaining| remaining.checked_sub(1),
        );
        if failing.is_ok() {
            return Err(BusError::ConnectFailed(format!(
                "simulated connect failure to '{connection_string}'"
            )));
        }

        debug!(%connection_string, "Opened in-memory backplane connection");
        self.backplane.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InMemoryMultiplexer {
            backplane: Arc::clone(&self.backplane),
            closed: AtomicBool::new(false),
        }))
    }
}

struct InMemoryMultiplexer {
    backplane: Arc<InMemoryBackplane>,
    closed: AtomicBool,
}

#[async_trait]
impl Multiplexer for InMemoryMultiplexer {
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.backplane.is_online()
    }

    async fn is_key_ready(&self, _database: u32, _key: &str) -> BusResult<bool> {
        Ok(self.is_connected() && self.backplane.ready.load(Ordering::SeqCst))
    }

    async fn script_evaluate(
        &self,
        database: u32,
        script: &BackplaneScript,
        key: &str,
        argument: &[u8],
    ) -> BusResult<ScriptValue> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Backplane("connection closed".into()));
        }
        if !self.backplane.is_online() {
            return Err(BusError::Backplane("store unreachable".into()));
        }

        self.backplane.script_calls.fetch_add(1, Ordering::SeqCst);
        if script.name != BackplaneScript::PUBLISH.name {
            return Err(BusError::UnsupportedScript(script.name.to_string()));
        }
        self.backplane.run_publish(database, key, argument)
    }

    async fn close(&self, _allow_commands_to_complete: bool) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.backplane.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.backplane.events.subscribe()
    }
}
