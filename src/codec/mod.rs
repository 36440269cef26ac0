// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Codec implementations for batch and completion payloads.
//!
//! Two encodings are available, matching the two kinds of deployment the
//! pipeline has been run with:
//!
//! * `json` - structured text, readable in the broker's management UI
//! * `protobuf` - compact binary frames
//!
//! Both wrap the message in an envelope carrying the codec name, the wire
//! version and the message kind, so a consumer configured with the other
//! codec (or an older schema) rejects the payload with a precise
//! [`CodecError`](crate::errors::CodecError).
//!
//! # Example
//! ```
//! use the_fan_in::codec::CodecKind;
//! use the_fan_in::model::{Record, RecordBatch};
//!
//! let codec = CodecKind::Json.build();
//! let batch = RecordBatch::new("signal", vec![Record::new(125.1, 0.002)]);
//!
//! let payload = codec.encode_batch(&batch).unwrap();
//! assert_eq!(codec.decode_batch(&payload).unwrap(), batch);
//! ```

mod json;
mod protobuf;

pub use json::JsonCodec;
pub use protobuf::ProtobufCodec;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::traits::Codec;

/// Codec selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Json,
    Protobuf,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            CodecKind::Json => Arc::new(JsonCodec),
            CodecKind::Protobuf => Arc::new(ProtobufCodec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CodecError;
    use crate::model::{BatchMetadata, CompletionSignal, Record, RecordBatch};

    fn all_codecs() -> Vec<Arc<dyn Codec>> {
        vec![CodecKind::Json.build(), CodecKind::Protobuf.build()]
    }

    #[test]
    fn test_batch_round_trip_empty_single_and_many() {
        let many: Vec<Record> = (0..250)
            .map(|i| Record::new(80.0 + i as f64 * 0.68, 1.0 / (i as f64 + 3.0)))
            .collect();
        let batches = vec![
            RecordBatch::new("data", vec![]),
            RecordBatch::new("signal", vec![Record::new(124.97, 0.0031)]).with_metadata(
                BatchMetadata::new(
                    Some("#00cdff".to_string()),
                    Some("Signal ($m_H$ = 125 GeV)".to_string()),
                ),
            ),
            RecordBatch::new("background_zz", many).with_metadata(BatchMetadata::new(
                Some("#ff0000".to_string()),
                None,
            )),
        ];

        for codec in all_codecs() {
            for batch in &batches {
                let payload = codec.encode_batch(batch).unwrap();
                let decoded = codec.decode_batch(&payload).unwrap();
                assert_eq!(&decoded, batch, "codec {}", codec.name());
            }
        }
    }

    #[test]
    fn test_signal_round_trip_preserves_timestamp() {
        let signal = CompletionSignal::now("signal-worker");
        for codec in all_codecs() {
            let payload = codec.encode_signal(&signal).unwrap();
            assert_eq!(codec.decode_signal(&payload).unwrap(), signal);
        }
    }

    #[test]
    fn test_mixed_codecs_fail_fast() {
        let batch = RecordBatch::new("data", vec![Record::unweighted(91.2)]);

        let json_payload = JsonCodec.encode_batch(&batch).unwrap();
        assert!(ProtobufCodec.decode_batch(&json_payload).is_err());

        let proto_payload = ProtobufCodec.encode_batch(&batch).unwrap();
        assert!(matches!(
            JsonCodec.decode_batch(&proto_payload),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrong_message_kind_is_reported() {
        let signal = CompletionSignal::now("data-worker");
        for codec in all_codecs() {
            let payload = codec.encode_signal(&signal).unwrap();
            let err = codec.decode_batch(&payload).unwrap_err();
            assert!(
                matches!(err, CodecError::UnexpectedKind { .. }),
                "codec {} returned {:?}",
                codec.name(),
                err
            );
        }
    }

    #[test]
    fn test_codec_kind_deserializes_from_config_names() {
        let kind: CodecKind = serde_yaml::from_str("protobuf").unwrap();
        assert_eq!(kind, CodecKind::Protobuf);
        assert_eq!(kind.build().name(), "protobuf");
        assert_eq!(CodecKind::default().build().name(), "json");
    }
}
