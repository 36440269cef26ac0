// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Values exchanged between workers and the aggregator.
//!
//! Everything here is plain data: batches and signals are built once by a
//! producer, travel through the broker inside a codec envelope, and are only
//! ever read on the consuming side.

mod batch;
mod partition;
mod queue;
mod result;
mod signal;

pub use batch::{BatchMetadata, Record, RecordBatch};
pub use partition::Partition;
pub use queue::QueueSpec;
pub use result::{MergePolicy, PipelineResult};
pub use signal::CompletionSignal;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two message types a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    RecordBatch,
    CompletionSignal,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::RecordBatch => write!(f, "record_batch"),
            MessageKind::CompletionSignal => write!(f, "completion_signal"),
        }
    }
}

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Batch(RecordBatch),
    Signal(CompletionSignal),
}

impl WireMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::Batch(_) => MessageKind::RecordBatch,
            WireMessage::Signal(_) => MessageKind::CompletionSignal,
        }
    }
}

impl From<RecordBatch> for WireMessage {
    fn from(batch: RecordBatch) -> Self {
        WireMessage::Batch(batch)
    }
}

impl From<CompletionSignal> for WireMessage {
    fn from(signal: CompletionSignal) -> Self {
        WireMessage::Signal(signal)
    }
}
