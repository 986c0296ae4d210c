//! # Backplane Bus
//!
//! Producer-side abstractions over the scale-out backplane.
//!
//! ## Layers
//!
//! ```text
//! Connection::send(ConnectionMessage)
//!        │ validate, serialize (pooled), fan out
//!        ↓
//! MessageBus::publish(Message)          ← blanket impl for every ScaleoutBus
//!        │
//!        ↓
//! ScaleoutBus::send_to_stream(0, [Message])
//!        │
//!        ↓
//! backplane adapter (Redis, in-process)
//! ```
//!
//! [`MemoryPool`] supplies the buffers used on the serialization path.

pub mod bus;
pub mod connection;
pub mod connection_manager;
pub mod memory_pool;

pub use bus::{check_stream, MessageBus, NoopStreamHook, ScaleoutBus, StreamHook};
pub use connection::Connection;
pub use connection_manager::ConnectionManager;
pub use memory_pool::{BufferSegment, MemoryPool, PooledWriter, TieredPool, BYTE_TIERS, CHAR_TIERS};
