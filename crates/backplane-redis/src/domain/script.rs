//! The publish script and its reply.
//!
//! ```text
//! KEYS[1] = event key, ARGV[1] = serialized batch
//!
//! newId   = INCR KEYS[1]
//! payload = newId .. ' ' .. ARGV[1]
//! PUBLISH KEYS[1] payload
//! return {newId, ARGV[1], payload}
//! ```
//!
//! Counter increment and publish run atomically on the store, so every
//! subscriber of a key sees gap-free, strictly increasing sequence numbers.

use backplane_types::{BusError, SequenceNumber};

/// A server-side script, identified by name for adapters that execute it
/// natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackplaneScript {
    pub name: &'static str,
    pub source: &'static str,
}

impl BackplaneScript {
    /// Increment the key's counter and publish `"<seq> <bytes>"` on the key.
    pub const PUBLISH: BackplaneScript = BackplaneScript {
        name: "publish",
        source: r"local newId = redis.call('INCR', KEYS[1])
local payload = newId .. ' ' .. ARGV[1]
redis.call('PUBLISH', KEYS[1], payload)
return {newId, ARGV[1], payload}",
    };
}

/// Store-agnostic script reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    Nil,
    Int(i64),
    Bulk(Vec<u8>),
    Array(Vec<ScriptValue>),
    Status(String),
    /// Reply kinds the backplane never produces, kept for diagnostics.
    Other(String),
}

/// Parsed reply of [`BackplaneScript::PUBLISH`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Sequence number assigned to the batch.
    pub sequence: SequenceNumber,
    /// Batch bytes as received by the script.
    pub message_bytes: Vec<u8>,
    /// Exact payload published on the channel.
    pub payload: Vec<u8>,
}

impl TryFrom<ScriptValue> for PublishReceipt {
    type Error = BusError;

    fn try_from(value: ScriptValue) -> Result<Self, Self::Error> {
        let ScriptValue::Array(items) = value else {
            return Err(BusError::UnexpectedReply(format!(
                "expected array, got {value:?}"
            )));
        };

        let mut items = items.into_iter();
        match (items.next(), items.next(), items.next(), items.next()) {
            (
                Some(ScriptValue::Int(sequence)),
                Some(ScriptValue::Bulk(message_bytes)),
                Some(ScriptValue::Bulk(payload)),
                None,
            ) => {
                let sequence = SequenceNumber::try_from(sequence).map_err(|_| {
                    BusError::UnexpectedReply(format!("negative sequence number {sequence}"))
                })?;
                Ok(PublishReceipt {
                    sequence,
                    message_bytes,
                    payload,
                })
            }
            other => Err(BusError::UnexpectedReply(format!(
                "expected {{sequence, message, payload}}, got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(sequence: i64, body: &[u8]) -> ScriptValue {
        let mut payload = format!("{sequence} ").into_bytes();
        payload.extend_from_slice(body);
        ScriptValue::Array(vec![
            ScriptValue::Int(sequence),
            ScriptValue::Bulk(body.to_vec()),
            ScriptValue::Bulk(payload),
        ])
    }

    #[test]
    fn test_script_increments_then_publishes_on_same_key() {
        let source = BackplaneScript::PUBLISH.source;
        let incr = source.find("'INCR', KEYS[1]").unwrap();
        let publish = source.find("'PUBLISH', KEYS[1], payload").unwrap();
        assert!(incr < publish);
        assert!(source.contains("newId .. ' ' .. ARGV[1]"));
    }

    #[test]
    fn test_receipt_from_reply() {
        let receipt = PublishReceipt::try_from(reply(42, b"batch")).unwrap();
        assert_eq!(receipt.sequence, 42);
        assert_eq!(receipt.message_bytes, b"batch");
        assert_eq!(receipt.payload, b"42 batch");
    }

    #[test]
    fn test_receipt_rejects_wrong_shape() {
        let err = PublishReceipt::try_from(ScriptValue::Int(1)).unwrap_err();
        assert!(matches!(err, BusError::UnexpectedReply(_)));

        let short = ScriptValue::Array(vec![ScriptValue::Int(1)]);
        assert!(PublishReceipt::try_from(short).is_err());

        let negative = reply(-1, b"x");
        assert!(PublishReceipt::try_from(negative).is_err());
    }
}
