//! # Wire Format
//!
//! Two layers travel over the backplane:
//!
//! 1. **Batch**: a list of [`Message`]s encoded with `bincode`. These are the
//!    "serialized message bytes" handed to the publish script.
//! 2. **Frame**: what subscribers actually receive,
//!    `"<sequence><space><batch bytes>"`.
//!
//! Subscribers split the frame on the first whitespace, parse the left side
//! as the sequence number and decode the right side as a batch.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::errors::{BusError, BusResult};
use crate::message::Message;
use crate::SequenceNumber;

/// Borrowed view used for encoding without cloning messages.
#[derive(Serialize)]
struct BatchRef<'a> {
    messages: &'a [Message],
}

/// A decoded batch of messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScaleoutBatch {
    /// Messages in publish order.
    pub messages: Vec<Message>,
}

impl ScaleoutBatch {
    /// Exact number of bytes [`ScaleoutBatch::encode_into`] will write.
    pub fn encoded_len(messages: &[Message]) -> BusResult<usize> {
        let size = bincode::serialized_size(&BatchRef { messages })?;
        usize::try_from(size).map_err(|_| BusError::Serialization("batch too large".into()))
    }

    /// Encode a batch into a freshly allocated buffer.
    pub fn encode(messages: &[Message]) -> BusResult<Vec<u8>> {
        Ok(bincode::serialize(&BatchRef { messages })?)
    }

    /// Encode a batch into any writer, e.g. a pooled buffer slice.
    pub fn encode_into<W: Write>(writer: W, messages: &[Message]) -> BusResult<()> {
        bincode::serialize_into(writer, &BatchRef { messages })?;
        Ok(())
    }

    /// Decode a batch previously produced by [`ScaleoutBatch::encode`].
    pub fn decode(bytes: &[u8]) -> BusResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A sequenced payload as published on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencedFrame<'a> {
    /// Sequence number assigned by the backplane.
    pub sequence: SequenceNumber,
    /// Verbatim serialized batch.
    pub body: &'a [u8],
}

impl<'a> SequencedFrame<'a> {
    /// Split a received payload on the first whitespace byte.
    pub fn parse(payload: &'a [u8]) -> BusResult<Self> {
        let split = payload
            .iter()
            .position(u8::is_ascii_whitespace)
            .ok_or_else(|| BusError::MalformedFrame("missing separator".into()))?;

        let head = std::str::from_utf8(&payload[..split])
            .map_err(|_| BusError::MalformedFrame("sequence is not utf-8".into()))?;
        let sequence = head
            .parse::<SequenceNumber>()
            .map_err(|e| BusError::MalformedFrame(format!("bad sequence '{head}': {e}")))?;

        Ok(Self {
            sequence,
            body: &payload[split + 1..],
        })
    }

    /// Build `"<sequence> <body>"`, byte-identical to the publish script.
    #[must_use]
    pub fn format(sequence: SequenceNumber, body: &[u8]) -> Vec<u8> {
        let head = sequence.to_string();
        let mut payload = Vec::with_capacity(head.len() + 1 + body.len());
        payload.extend_from_slice(head.as_bytes());
        payload.push(b' ');
        payload.extend_from_slice(body);
        payload
    }
}
