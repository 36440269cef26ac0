// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::model::MessageKind;
use thiserror::Error;

/// Errors produced while encoding or decoding wire payloads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The payload was written by a different codec.
    #[error("payload written by codec '{found}', expected '{expected}'")]
    CodecMismatch { expected: String, found: String },

    /// The payload carries an unsupported wire version.
    #[error("wire version {found} is not supported (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },

    /// The payload holds a different message type than the caller asked for.
    #[error("expected a {expected} payload, found {found}")]
    UnexpectedKind {
        expected: MessageKind,
        found: MessageKind,
    },

    /// The payload could not be parsed at all.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The value cannot be represented in this codec.
    #[error("cannot encode payload: {0}")]
    Unencodable(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

impl From<prost::DecodeError> for CodecError {
    fn from(err: prost::DecodeError) -> Self {
        CodecError::Malformed(err.to_string())
    }
}
