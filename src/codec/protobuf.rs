// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use prost::Message;
use std::time::{Duration, UNIX_EPOCH};

use crate::errors::CodecError;
use crate::model::{BatchMetadata, CompletionSignal, MessageKind, Record, RecordBatch, WireMessage};
use crate::proto::wire_v1;
use crate::traits::{Codec, WIRE_VERSION};

const CODEC_NAME: &str = "protobuf";
const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Binary codec built on `prost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufCodec;

fn kind_to_wire(kind: MessageKind) -> u32 {
    match kind {
        MessageKind::RecordBatch => wire_v1::KIND_RECORD_BATCH,
        MessageKind::CompletionSignal => wire_v1::KIND_COMPLETION_SIGNAL,
    }
}

fn kind_from_wire(kind: u32) -> Result<MessageKind, CodecError> {
    match kind {
        wire_v1::KIND_RECORD_BATCH => Ok(MessageKind::RecordBatch),
        wire_v1::KIND_COMPLETION_SIGNAL => Ok(MessageKind::CompletionSignal),
        other => Err(CodecError::Malformed(format!("unknown message kind {}", other))),
    }
}

fn batch_to_wire(batch: &RecordBatch) -> wire_v1::RecordBatch {
    wire_v1::RecordBatch {
        category: batch.category.clone(),
        records: batch
            .records
            .iter()
            .map(|r| wire_v1::Record {
                observable: r.observable,
                weight: r.weight,
            })
            .collect(),
        color: batch.metadata.color.clone(),
        label: batch.metadata.label.clone(),
    }
}

fn batch_from_wire(batch: wire_v1::RecordBatch) -> RecordBatch {
    RecordBatch {
        category: batch.category,
        records: batch
            .records
            .into_iter()
            .map(|r| Record::new(r.observable, r.weight))
            .collect(),
        metadata: BatchMetadata::new(batch.color, batch.label),
    }
}

fn signal_to_wire(signal: &CompletionSignal) -> Result<wire_v1::CompletionSignal, CodecError> {
    let since_epoch = signal
        .timestamp
        .duration_since(UNIX_EPOCH)
        .map_err(|_| CodecError::Unencodable("timestamp precedes the unix epoch".to_string()))?;
    Ok(wire_v1::CompletionSignal {
        sender_id: signal.sender_id.clone(),
        seconds: since_epoch.as_secs(),
        nanos: since_epoch.subsec_nanos(),
    })
}

fn signal_from_wire(signal: wire_v1::CompletionSignal) -> Result<CompletionSignal, CodecError> {
    if signal.nanos >= NANOS_PER_SECOND {
        return Err(CodecError::Malformed(format!(
            "timestamp nanos out of range: {}",
            signal.nanos
        )));
    }
    let timestamp = UNIX_EPOCH
        .checked_add(Duration::new(signal.seconds, signal.nanos))
        .ok_or_else(|| CodecError::Malformed("timestamp out of range".to_string()))?;
    Ok(CompletionSignal {
        sender_id: signal.sender_id,
        timestamp,
    })
}

impl Codec for ProtobufCodec {
    fn name(&self) -> &'static str {
        CODEC_NAME
    }

    fn encode(&self, message: &WireMessage) -> Result<Vec<u8>, CodecError> {
        let body = match message {
            WireMessage::Batch(batch) => batch_to_wire(batch).encode_to_vec(),
            WireMessage::Signal(signal) => signal_to_wire(signal)?.encode_to_vec(),
        };
        let envelope = wire_v1::Envelope {
            codec: CODEC_NAME.to_string(),
            version: WIRE_VERSION,
            kind: kind_to_wire(message.kind()),
            body,
        };
        Ok(envelope.encode_to_vec())
    }

    fn decode(&self, payload: &[u8], expected: MessageKind) -> Result<WireMessage, CodecError> {
        let envelope = wire_v1::Envelope::decode(payload)?;

        if envelope.codec != CODEC_NAME {
            return Err(CodecError::CodecMismatch {
                expected: CODEC_NAME.to_string(),
                found: envelope.codec,
            });
        }
        if envelope.version != WIRE_VERSION {
            return Err(CodecError::VersionMismatch {
                expected: WIRE_VERSION,
                found: envelope.version,
            });
        }
        let kind = kind_from_wire(envelope.kind)?;
        if kind != expected {
            return Err(CodecError::UnexpectedKind {
                expected,
                found: kind,
            });
        }

        let body = envelope.body.as_slice();
        let message = match kind {
            MessageKind::RecordBatch => {
                WireMessage::Batch(batch_from_wire(wire_v1::RecordBatch::decode(body)?))
            }
            MessageKind::CompletionSignal => {
                WireMessage::Signal(signal_from_wire(wire_v1::CompletionSignal::decode(body)?)?)
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_values_survive_binary_encoding() {
        let batch = RecordBatch::new("data", vec![Record::new(f64::INFINITY, 1.0)]);
        let payload = ProtobufCodec.encode_batch(&batch).unwrap();
        assert_eq!(ProtobufCodec.decode_batch(&payload).unwrap(), batch);
    }

    #[test]
    fn test_future_wire_version_is_rejected() {
        let envelope = wire_v1::Envelope {
            codec: CODEC_NAME.to_string(),
            version: WIRE_VERSION + 1,
            kind: wire_v1::KIND_RECORD_BATCH,
            body: Vec::new(),
        };
        let err = ProtobufCodec
            .decode_batch(&envelope.encode_to_vec())
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::VersionMismatch {
                expected: WIRE_VERSION,
                found: WIRE_VERSION + 1
            }
        );
    }

    #[test]
    fn test_out_of_range_nanos_are_malformed() {
        let body = wire_v1::CompletionSignal {
            sender_id: "w1".to_string(),
            seconds: 1,
            nanos: NANOS_PER_SECOND,
        };
        let envelope = wire_v1::Envelope {
            codec: CODEC_NAME.to_string(),
            version: WIRE_VERSION,
            kind: wire_v1::KIND_COMPLETION_SIGNAL,
            body: body.encode_to_vec(),
        };
        let err = ProtobufCodec
            .decode_signal(&envelope.encode_to_vec())
            .unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
