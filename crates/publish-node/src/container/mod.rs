//! # Publisher Container
//!
//! Configuration and the wired publish stack owned by the running node.

pub mod config;

pub use config::{Backend, ConfigError, NodeConfig};
