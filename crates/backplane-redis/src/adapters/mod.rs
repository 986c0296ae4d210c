//! Store adapters implementing the outbound ports.
//!
//! - [`redis`]: a real Redis server.
//! - [`memory`]: an in-process store for tests and single-machine runs.

pub mod memory;
pub mod redis;

pub use self::memory::{InMemoryBackplane, InMemoryConnector};
pub use self::redis::RedisConnector;
