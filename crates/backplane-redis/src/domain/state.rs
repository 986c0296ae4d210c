//! Lifecycle of a backplane connection.
//!
//! ```text
//! [Unconnected] ──connect──→ [Connecting] ──ok──→ [Connected]
//!       ↑                         │                    │
//!       └───────── failed ────────┘               close/dispose
//!                                                      ↓
//!                               [Closing] ──────→ [Disposed]
//! ```
//!
//! `Disposed` is terminal. A connect that completes after disposal leaves the
//! state untouched.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Unconnected,
    Connecting,
    Connected,
    Closing,
    Disposed,
}

impl ConnectionState {
    /// Value exported on the connection state gauge.
    #[must_use]
    pub fn gauge_value(self) -> f64 {
        match self {
            ConnectionState::Unconnected => 0.0,
            ConnectionState::Connecting => 1.0,
            ConnectionState::Connected => 2.0,
            ConnectionState::Closing => 3.0,
            ConnectionState::Disposed => 4.0,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Disposed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unconnected => "unconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}
