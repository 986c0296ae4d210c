//! Notifications raised by the store client.

use std::fmt;

/// Connection notification. Carries the triggering error text, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The store became unreachable.
    Failed { reason: Option<String> },
    /// The store is reachable again.
    Restored { reason: Option<String> },
    /// The store reported an error without dropping the connection.
    Error { message: String },
}

impl ConnectionEvent {
    /// Metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionEvent::Failed { .. } => "failed",
            ConnectionEvent::Restored { .. } => "restored",
            ConnectionEvent::Error { .. } => "error",
        }
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Failed { reason } | ConnectionEvent::Restored { reason } => write!(
                f,
                "{} ({})",
                self.kind(),
                reason.as_deref().unwrap_or("<none>")
            ),
            ConnectionEvent::Error { message } => write!(f, "error ({message})"),
        }
    }
}
