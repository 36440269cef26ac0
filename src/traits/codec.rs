// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::CodecError;
use crate::model::{CompletionSignal, MessageKind, RecordBatch, WireMessage};

/// Wire version written into every envelope. Bump when the payload schema changes.
pub const WIRE_VERSION: u32 = 1;

/// Serialization strategy shared by a producer and its consumers.
///
/// One codec is selected per deployment; payloads carry the codec name and
/// [`WIRE_VERSION`] so a consumer configured differently fails with a
/// [`CodecError`] instead of misreading the message.
pub trait Codec: Send + Sync {
    /// Name written into the envelope, e.g. `"json"`.
    fn name(&self) -> &'static str;

    fn encode(&self, message: &WireMessage) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, payload: &[u8], expected: MessageKind) -> Result<WireMessage, CodecError>;

    fn encode_batch(&self, batch: &RecordBatch) -> Result<Vec<u8>, CodecError> {
        self.encode(&WireMessage::Batch(batch.clone()))
    }

    fn encode_signal(&self, signal: &CompletionSignal) -> Result<Vec<u8>, CodecError> {
        self.encode(&WireMessage::Signal(signal.clone()))
    }

    fn decode_batch(&self, payload: &[u8]) -> Result<RecordBatch, CodecError> {
        match self.decode(payload, MessageKind::RecordBatch)? {
            WireMessage::Batch(batch) => Ok(batch),
            other => Err(CodecError::UnexpectedKind {
                expected: MessageKind::RecordBatch,
                found: other.kind(),
            }),
        }
    }

    fn decode_signal(&self, payload: &[u8]) -> Result<CompletionSignal, CodecError> {
        match self.decode(payload, MessageKind::CompletionSignal)? {
            WireMessage::Signal(signal) => Ok(signal),
            other => Err(CodecError::UnexpectedKind {
                expected: MessageKind::CompletionSignal,
                found: other.kind(),
            }),
        }
    }
}
