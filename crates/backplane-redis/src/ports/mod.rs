//! Ports of the Redis backplane.
//!
//! The backplane only drives outbound dependencies: a connector that opens a
//! store connection, and the connection itself.

pub mod outbound;

pub use outbound::{BackplaneConnector, Multiplexer};
