//! # Redis Backplane
//!
//! Scale-out bus over a Redis-compatible store. Each publish runs one atomic
//! script on the configured event key:
//!
//! ```text
//! INCR key → seq
//! PUBLISH key "<seq> <batch bytes>"
//! return {seq, batch bytes, payload}
//! ```
//!
//! so every subscriber of the key sees gap-free, strictly increasing sequence
//! numbers no matter how many processes publish.
//!
//! ## Lifecycle
//!
//! | Step | Behavior |
//! |------|----------|
//! | `RedisMessageBus::new` | spawns the reconnect loop and the event listener |
//! | connect fails | logged, retried after `reconnect_delay` (2 s) |
//! | connect succeeds | `open_stream(0)` |
//! | connection restored | wait until the key is ready, then `open_stream(0)` |
//! | publish while disconnected | fails fast with `NotStarted` |
//! | `dispose` | aborts both tasks, closes the connection; later publishes fail with `NotStarted` |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/redis.rs   - redis crate, ConnectionManager, PING     │
//! │  adapters/memory.rs  - in-process store with fault injection    │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs   - BackplaneConnector, Multiplexer          │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  connection.rs       - BackplaneConnection (lock, dispose race) │
//! │  bus.rs              - RedisMessageBus (ScaleoutBus)            │
//! │  domain/             - state, events, publish script, receipt   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod bus;
pub mod config;
pub mod connection;
pub mod domain;
pub mod ports;

pub use adapters::{InMemoryBackplane, InMemoryConnector, RedisConnector};
pub use bus::RedisMessageBus;
pub use config::{RedisScaleoutConfiguration, DEFAULT_RECONNECT_DELAY, DEFAULT_RESTORE_POLL_INTERVAL};
pub use connection::BackplaneConnection;
pub use domain::{BackplaneScript, ConnectionEvent, ConnectionState, PublishReceipt, ScriptValue};
pub use ports::{BackplaneConnector, Multiplexer};
