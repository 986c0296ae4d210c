//! # Error Types
//!
//! Failures surfaced by the bus, the backplane connection and the publishing
//! facade.

use thiserror::Error;

/// Result alias used throughout the backplane crates.
pub type BusResult<T> = Result<T, BusError>;

/// Errors that can occur while publishing to the backplane.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// No live connection is installed (never connected, or disposed).
    #[error("Backplane connection not started")]
    NotStarted,

    /// The connection was disposed before the operation could run.
    #[error("Backplane connection has been disposed")]
    Disposed,

    /// Opening the underlying store connection failed.
    #[error("Failed to connect to backplane: {0}")]
    ConnectFailed(String),

    /// A message named both a single signal and a signal list.
    #[error("Ambiguous message: signal '{signal}' and signals [{signals}] are both set")]
    AmbiguousMessage { signal: String, signals: String },

    /// Acknowledged delivery was requested.
    #[error("Acknowledgments are not supported by the backplane")]
    AckNotSupported,

    /// Stream index outside the configured partition range.
    #[error("Invalid stream index {index}: backplane has {count} stream(s)")]
    InvalidStream { index: usize, count: usize },

    /// Message value or batch could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A received payload did not match `"<sequence> <body>"`.
    #[error("Malformed backplane frame: {0}")]
    MalformedFrame(String),

    /// The store rejected or failed a command.
    #[error("Backplane error: {0}")]
    Backplane(String),

    /// The store answered with a reply of the wrong shape.
    #[error("Unexpected script reply: {0}")]
    UnexpectedReply(String),

    /// The store adapter cannot evaluate the requested script.
    #[error("Unsupported script: {0}")]
    UnsupportedScript(String),

    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl BusError {
    /// Returns true if retrying later may succeed.
    ///
    /// Connectivity failures are transient; structural misuse is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BusError::NotStarted | BusError::ConnectFailed(_) | BusError::Backplane(_)
        )
    }

    /// Short label used for metrics and structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::NotStarted => "not_started",
            BusError::Disposed => "disposed",
            BusError::ConnectFailed(_) => "connect_failed",
            BusError::AmbiguousMessage { .. } => "ambiguous_message",
            BusError::AckNotSupported => "ack_not_supported",
            BusError::InvalidStream { .. } => "invalid_stream",
            BusError::Serialization(_) => "serialization",
            BusError::MalformedFrame(_) => "malformed_frame",
            BusError::Backplane(_) => "backplane",
            BusError::UnexpectedReply(_) => "unexpected_reply",
            BusError::UnsupportedScript(_) => "unsupported_script",
            BusError::InvalidConfiguration(_) => "invalid_configuration",
        }
    }
}

impl From<bincode::Error> for BusError {
    fn from(err: bincode::Error) -> Self {
        BusError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Serialization(err.to_string())
    }
}
