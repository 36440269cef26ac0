// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;
use crate::model::{MessageKind, RecordBatch, WireMessage};
use crate::traits::{Codec, WIRE_VERSION};

const CODEC_NAME: &str = "json";

#[derive(Serialize, Deserialize)]
struct JsonEnvelope {
    codec: String,
    version: u32,
    kind: MessageKind,
    body: serde_json::Value,
}

/// Structured-text codec built on `serde_json`.
///
/// ```text
/// {"codec":"json","version":1,"kind":"record_batch","body":{"category":"data",...}}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn check_finite(batch: &RecordBatch) -> Result<(), CodecError> {
        match batch
            .records
            .iter()
            .position(|r| !r.observable.is_finite() || !r.weight.is_finite())
        {
            Some(index) => Err(CodecError::Unencodable(format!(
                "record {} of category '{}' is not finite",
                index, batch.category
            ))),
            None => Ok(()),
        }
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        CODEC_NAME
    }

    fn encode(&self, message: &WireMessage) -> Result<Vec<u8>, CodecError> {
        let body = match message {
            WireMessage::Batch(batch) => {
                Self::check_finite(batch)?;
                serde_json::to_value(batch)
            }
            WireMessage::Signal(signal) => serde_json::to_value(signal),
        }
        .map_err(|e| CodecError::Unencodable(e.to_string()))?;

        let envelope = JsonEnvelope {
            codec: CODEC_NAME.to_string(),
            version: WIRE_VERSION,
            kind: message.kind(),
            body,
        };
        serde_json::to_vec(&envelope).map_err(|e| CodecError::Unencodable(e.to_string()))
    }

    fn decode(&self, payload: &[u8], expected: MessageKind) -> Result<WireMessage, CodecError> {
        let envelope: JsonEnvelope = serde_json::from_slice(payload)?;

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
        if envelope.kind != expected {
            return Err(CodecError::UnexpectedKind {
                expected,
                found: envelope.kind,
            });
        }

        let message = match envelope.kind {
            MessageKind::RecordBatch => WireMessage::Batch(serde_json::from_value(envelope.body)?),
            MessageKind::CompletionSignal => {
                WireMessage::Signal(serde_json::from_value(envelope.body)?)
            }
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    #[test]
    fn test_rejects_non_finite_records() {
        let batch = RecordBatch::new("signal", vec![Record::new(f64::NAN, 1.0)]);
        let err = JsonCodec.encode_batch(&batch).unwrap_err();
        assert!(matches!(err, CodecError::Unencodable(_)));
    }

    #[test]
    fn test_future_wire_version_is_rejected() {
        let payload = br#"{"codec":"json","version":7,"kind":"completion_signal","body":{}}"#;
        let err = JsonCodec.decode_signal(payload).unwrap_err();
        assert_eq!(
            err,
            CodecError::VersionMismatch {
                expected: WIRE_VERSION,
                found: 7
            }
        );
    }

    #[test]
    fn test_plain_text_completion_message_is_malformed() {
        let err = JsonCodec.decode_signal(b"Processing completed").unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_foreign_codec_name_is_rejected() {
        let payload = br#"{"codec":"pickle","version":1,"kind":"record_batch","body":{}}"#;
        let err = JsonCodec.decode_batch(payload).unwrap_err();
        assert!(matches!(err, CodecError::CodecMismatch { found, .. } if found == "pickle"));
    }

    #[test]
    fn test_metadata_is_optional_on_the_wire() {
        let payload = br#"{"codec":"json","version":1,"kind":"record_batch",
            "body":{"category":"data","records":[{"observable":124.5,"weight":1.0}]}}"#;
        let batch = JsonCodec.decode_batch(payload).unwrap();
        assert_eq!(batch.category, "data");
        assert_eq!(batch.records, vec![Record::new(124.5, 1.0)]);
        assert!(batch.metadata.color.is_none());
    }
}
