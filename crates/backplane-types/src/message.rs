//! # Messages
//!
//! [`Message`] is what travels over the backplane. It is built once by the
//! producer and never mutated after it is handed to the bus.
//!
//! [`ConnectionMessage`] is the caller-facing request: it names either one
//! signal or a list of signals and carries an unserialized value.

use serde::{Deserialize, Serialize};

use crate::errors::{BusError, BusResult};

/// Separator used when joining excluded signals into a filter.
pub const FILTER_SEPARATOR: &str = "|";

/// A message published on the backplane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the connection that produced the message.
    source: String,
    /// Channel key (signal) the message is addressed to.
    key: String,
    /// Serialized payload.
    value: Vec<u8>,
    /// Signals that must not receive the message, joined by `|`.
    filter: Option<String>,
    /// Command correlation id, if the payload is a command.
    command_id: Option<String>,
    /// Whether the producer asked for an acknowledgment.
    wait_for_ack: bool,
}

impl Message {
    /// Create a message from an origin, a key and serialized bytes.
    #[must_use]
    pub fn new(source: impl Into<String>, key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
            value,
            filter: None,
            command_id: None,
            wait_for_ack: false,
        }
    }

    /// Attach an exclusion filter. Empty filters are ignored.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    /// Mark the message as a command.
    #[must_use]
    pub fn with_command(mut self, command_id: impl Into<String>, wait_for_ack: bool) -> Self {
        self.command_id = Some(command_id.into());
        self.wait_for_ack = wait_for_ack;
        self
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    #[must_use]
    pub fn command_id(&self) -> Option<&str> {
        self.command_id.as_deref()
    }

    #[must_use]
    pub fn wait_for_ack(&self) -> bool {
        self.wait_for_ack
    }
}

/// Value carried by a [`ConnectionMessage`].
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    /// Bytes that are already JSON-serialized; published verbatim.
    Serialized(Vec<u8>),
    /// A JSON value serialized once before publishing.
    Json(serde_json::Value),
}

impl From<serde_json::Value> for MessageValue {
    fn from(value: serde_json::Value) -> Self {
        MessageValue::Json(value)
    }
}

/// Caller-facing publish request.
///
/// Exactly one of `signal` / `signals` should be set. Setting both is
/// rejected before any backplane interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMessage {
    /// Single destination signal.
    pub signal: Option<String>,
    /// Destination list; the value is serialized once and fanned out.
    pub signals: Option<Vec<String>>,
    /// Payload.
    pub value: MessageValue,
    /// Signals that must not receive the message.
    pub excluded_signals: Option<Vec<String>>,
    /// Request acknowledged delivery (unsupported).
    pub wait_for_ack: bool,
}

impl ConnectionMessage {
    /// Address a single signal.
    #[must_use]
    pub fn to_signal(signal: impl Into<String>, value: impl Into<MessageValue>) -> Self {
        Self {
            signal: Some(signal.into()),
            signals: None,
            value: value.into(),
            excluded_signals: None,
            wait_for_ack: false,
        }
    }

    /// Address a list of signals.
    #[must_use]
    pub fn to_signals(signals: Vec<String>, value: impl Into<MessageValue>) -> Self {
        Self {
            signal: None,
            signals: Some(signals),
            value: value.into(),
            excluded_signals: None,
            wait_for_ack: false,
        }
    }

    /// Exclude signals from delivery.
    #[must_use]
    pub fn excluding(mut self, excluded: Vec<String>) -> Self {
        self.excluded_signals = Some(excluded);
        self
    }

    /// Request an acknowledgment.
    #[must_use]
    pub fn with_ack(mut self) -> Self {
        self.wait_for_ack = true;
        self
    }

    /// Reject messages that set both a single signal and a signal list.
    ///
    /// An empty single signal does not count as set.
    pub fn validate(&self) -> BusResult<()> {
        match (&self.signal, &self.signals) {
            (Some(signal), Some(signals)) if !signal.is_empty() => {
                Err(BusError::AmbiguousMessage {
                    signal: signal.clone(),
                    signals: signals.join(", "),
                })
            }
            _ => Ok(()),
        }
    }

    /// Exclusion filter, or `None` when nothing is excluded.
    #[must_use]
    pub fn filter(&self) -> Option<String> {
        self.excluded_signals
            .as_ref()
            .filter(|excluded| !excluded.is_empty())
            .map(|excluded| excluded.join(FILTER_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_accessors() {
        let message = Message::new("conn-1", "hub.chat", b"{}".to_vec())
            .with_filter("a|b")
            .with_command("cmd-7", false);

        assert_eq!(message.source(), "conn-1");
        assert_eq!(message.key(), "hub.chat");
        assert_eq!(message.value(), b"{}");
        assert_eq!(message.filter(), Some("a|b"));
        assert_eq!(message.command_id(), Some("cmd-7"));
        assert!(!message.wait_for_ack());
    }

    #[test]
    fn test_empty_filter_is_dropped() {
        let message = Message::new("conn-1", "hub.chat", Vec::new()).with_filter("");
        assert_eq!(message.filter(), None);
    }

    #[test]
    fn test_validate_rejects_signal_and_signals() {
        let mut message = ConnectionMessage::to_signal("hub.a", json!(1));
        message.signals = Some(vec!["hub.b".into(), "hub.c".into()]);

        let err = message.validate().unwrap_err();
        assert_eq!(
            err,
            BusError::AmbiguousMessage {
                signal: "hub.a".into(),
                signals: "hub.b, hub.c".into(),
            }
        );
    }

    #[test]
    fn test_validate_accepts_empty_signal_with_list() {
        let mut message = ConnectionMessage::to_signals(vec!["hub.b".into()], json!(1));
        message.signal = Some(String::new());
        assert!(message.validate().is_ok());
    }

    #[test]
    fn test_filter_joins_excluded_signals() {
        let message = ConnectionMessage::to_signal("hub.a", json!("x"))
            .excluding(vec!["c-1".into(), "c-2".into()]);
        assert_eq!(message.filter().as_deref(), Some("c-1|c-2"));

        let empty = ConnectionMessage::to_signal("hub.a", json!("x")).excluding(Vec::new());
        assert_eq!(empty.filter(), None);
    }
}
