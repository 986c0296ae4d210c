//! # Backplane Types Crate
//!
//! Data model shared by the publishing side of the scale-out backplane.
//!
//! ## Contents
//!
//! - **`message`**: the immutable bus [`Message`] and the caller-facing
//!   [`ConnectionMessage`] used by the publishing facade.
//! - **`wire`**: the batch codec for serialized messages and the
//!   `"<sequence> <payload>"` frame every subscriber parses.
//! - **`errors`**: the [`BusError`] taxonomy.
//!
//! ## Wire Contract
//!
//! ```text
//! publish(batch) ──encode──→ bytes ──INCR key──→ seq
//!                                      │
//!                                      ↓
//!                     PUBLISH key "<seq> <bytes>"
//! ```
//!
//! Sequence numbers are per event key, strictly increasing and gap-free as
//! observed by the backplane. No ordering exists across keys.

pub mod errors;
pub mod message;
pub mod wire;

pub use errors::{BusError, BusResult};
pub use message::{ConnectionMessage, Message, MessageValue};
pub use wire::{ScaleoutBatch, SequencedFrame};

/// Index of one parallel backplane partition.
pub type StreamIndex = usize;

/// Per-key sequence number assigned by the backplane at publish time.
pub type SequenceNumber = u64;

/// Stream used by single-stream backplanes.
pub const DEFAULT_STREAM: StreamIndex = 0;
