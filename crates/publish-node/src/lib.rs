//! # Publish Node Library
//!
//! Wiring and the line publisher behind the `publish-node` binary, exposed
//! for testing.
//!
//! - `container/` - configuration from the environment
//! - `wiring/` - builds connector, connection, bus and connection manager
//! - `publisher` - publishes input lines to a signal

pub mod container;
pub mod publisher;
pub mod wiring;

pub use container::{Backend, ConfigError, NodeConfig};
pub use publisher::{publish_lines, PublishStats};
pub use wiring::{build_publisher, PublishStack};
