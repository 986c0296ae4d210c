//! # Backplane Connection
//!
//! Owns the single store connection shared by the reconnect loop, publish
//! calls and disposal.
//!
//! ## Locking
//!
//! Every write to the installed connection happens under one mutex. The lock
//! is never held across an await: teardown takes the connection out under the
//! lock and closes it afterwards. Readers clone the handle and treat "nothing
//! installed" as [`BusError::NotStarted`].
//!
//! ## Dispose race
//!
//! A connect that completes after `close`/`dispose` closes the fresh
//! connection and reports success, leaving the connection disposed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use backplane_telemetry::{CONNECTION_EVENTS, CONNECTION_STATE, CONNECT_ATTEMPTS};
use backplane_types::{BusError, BusResult};

use crate::config::DEFAULT_RESTORE_POLL_INTERVAL;
use crate::domain::{BackplaneScript, ConnectionEvent, ConnectionState, ScriptValue};
use crate::ports::{BackplaneConnector, Multiplexer};

const EVENT_CAPACITY: usize = 64;

struct Inner {
    state: ConnectionState,
    multiplexer: Option<Arc<dyn Multiplexer>>,
    forwarder: Option<JoinHandle<()>>,
}

impl Inner {
    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        CONNECTION_STATE.set(state.gauge_value());
    }
}

enum ConnectOutcome {
    Installed(Option<Arc<dyn Multiplexer>>, Option<JoinHandle<()>>),
    Discarded(Arc<dyn Multiplexer>),
    NotConnected(Arc<dyn Multiplexer>),
}

pub struct BackplaneConnection {
    connector: Arc<dyn BackplaneConnector>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<ConnectionEvent>,
    restore_poll_interval: Duration,
}

impl BackplaneConnection {
    pub fn new(connector: Arc<dyn BackplaneConnector>) -> Self {
        Self::with_poll_interval(connector, DEFAULT_RESTORE_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        connector: Arc<dyn BackplaneConnector>,
        restore_poll_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connector,
            inner: Mutex::new(Inner {
                state: ConnectionState::Unconnected,
                multiplexer: None,
                forwarder: None,
            }),
            events,
            restore_poll_interval,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Connection notifications: failed, restored, error.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Open the store connection and install it.
    ///
    /// Fails with [`BusError::Disposed`] once closed. Must run inside a Tokio
    /// runtime; installing a connection spawns its notification forwarder.
    pub async fn connect(&self, connection_string: &str) -> BusResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(BusError::Disposed);
            }
            inner.set_state(ConnectionState::Connecting);
        }

        let multiplexer = match self.connector.connect(connection_string).await {
            Ok(multiplexer) => multiplexer,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.state == ConnectionState::Connecting {
                    let fallback = if inner.multiplexer.is_some() {
                        ConnectionState::Connected
                    } else {
                        ConnectionState::Unconnected
                    };
                    inner.set_state(fallback);
                }
                CONNECT_ATTEMPTS.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        let outcome = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                ConnectOutcome::Discarded(multiplexer)
            } else if !multiplexer.is_connected() {
                let fallback = if inner.multiplexer.is_some() {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Unconnected
                };
                inner.set_state(fallback);
                ConnectOutcome::NotConnected(multiplexer)
            } else {
                let forwarder = self.spawn_forwarder(multiplexer.events());
                let previous = inner.multiplexer.replace(multiplexer);
                let previous_forwarder = inner.forwarder.replace(forwarder);
                inner.set_state(ConnectionState::Connected);
                ConnectOutcome::Installed(previous, previous_forwarder)
            }
        };

        match outcome {
            ConnectOutcome::Installed(previous, previous_forwarder) => {
                if let Some(forwarder) = previous_forwarder {
                    forwarder.abort();
                }
                if let Some(previous) = previous {
                    debug!("Replacing existing backplane connection");
                    previous.close(true).await;
                }
                CONNECT_ATTEMPTS.with_label_values(&["success"]).inc();
                info!("Connected to backplane");
                Ok(())
            }
            ConnectOutcome::Discarded(multiplexer) => {
                debug!("Connection completed after disposal, discarding");
                multiplexer.close(false).await;
                CONNECT_ATTEMPTS.with_label_values(&["discarded"]).inc();
                Ok(())
            }
            ConnectOutcome::NotConnected(multiplexer) => {
                multiplexer.close(false).await;
                CONNECT_ATTEMPTS.with_label_values(&["failed"]).inc();
                Err(BusError::ConnectFailed(
                    "connection opened but not connected".into(),
                ))
            }
        }
    }

    fn spawn_forwarder(&self, mut source: broadcast::Receiver<ConnectionEvent>) -> JoinHandle<()> {
        let sink = self.events.clone();
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        match &event {
                            ConnectionEvent::Failed { reason } => warn!(
                                reason = reason.as_deref().unwrap_or("<none>"),
                                "Backplane connection failed"
                            ),
                            ConnectionEvent::Restored { reason } => info!(
                                reason = reason.as_deref().unwrap_or("<none>"),
                                "Backplane connection restored"
                            ),
                            ConnectionEvent::Error { message } => {
                                warn!(%message, "Backplane error")
                            }
                        }
                        CONNECTION_EVENTS.with_label_values(&[event.kind()]).inc();
                        // No subscribers is fine.
                        let _ = sink.send(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dropped backplane notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn current(&self) -> Option<Arc<dyn Multiplexer>> {
        self.inner.lock().multiplexer.clone()
    }

    /// Evaluate a script on the installed connection.
    pub async fn script_evaluate(
        &self,
        database: u32,
        script: &BackplaneScript,
        key: &str,
        argument: &[u8],
    ) -> BusResult<ScriptValue> {
        let multiplexer = self.current().ok_or(BusError::NotStarted)?;
        multiplexer
            .script_evaluate(database, script, key, argument)
            .await
    }

    /// Wait until `key` is served again after a restore.
    ///
    /// Polls readiness only; the counter is not touched. Errors are logged and
    /// swallowed.
    pub async fn restore_latest_value_for_key(&self, database: u32, key: &str) {
        loop {
            let Some(multiplexer) = self.current() else {
                error!(%key, "Error while restoring backplane key: connection not started");
                return;
            };

            match multiplexer.is_key_ready(database, key).await {
                Ok(true) => {
                    trace!(%key, database, "Backplane key ready");
                    return;
                }
                Ok(false) => tokio::time::sleep(self.restore_poll_interval).await,
                Err(e) => {
                    error!(%key, error = %e, "Error while restoring backplane key");
                    return;
                }
            }
        }
    }

    /// Close the connection for `key` and mark it disposed. Idempotent.
    pub async fn close(&self, key: &str, allow_commands_to_complete: bool) {
        debug!(%key, allow_commands_to_complete, "Closing backplane connection");
        self.teardown(allow_commands_to_complete).await;
    }

    /// Dispose the connection. Idempotent and safe to race with `connect`.
    pub async fn dispose(&self) {
        trace!("Disposing backplane connection");
        self.teardown(false).await;
    }

    async fn teardown(&self, allow_commands_to_complete: bool) {
        let (multiplexer, forwarder) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.set_state(ConnectionState::Closing);
            (inner.multiplexer.take(), inner.forwarder.take())
        };

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        if let Some(multiplexer) = multiplexer {
            multiplexer.close(allow_commands_to_complete).await;
        }

        self.inner.lock().set_state(ConnectionState::Disposed);
    }
}

impl Drop for BackplaneConnection {
    fn drop(&mut self) {
        if let Some(forwarder) = self.inner.get_mut().forwarder.take() {
            forwarder.abort();
        }
    }
}

impl std::fmt::Debug for BackplaneConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackplaneConnection")
            .field("state", &self.state())
            .field("restore_poll_interval", &self.restore_poll_interval)
            .finish_non_exhaustive()
    }
}
