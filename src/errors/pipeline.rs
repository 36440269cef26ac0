// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for the worker, barrier and aggregator stages.

use std::time::Duration;
use thiserror::Error;

use super::{BrokerError, CodecError, ConnectionError};

/// Failure reported by the dataset transform collaborator.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("failed to read partition source '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("partition source '{path}' is not valid: {reason}")]
    InvalidSource { path: String, reason: String },

    #[error("partition '{0}' has no sources")]
    EmptyPartition(String),
}

/// Failure reported by the renderer collaborator.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to write render artifact '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid render settings: {0}")]
    InvalidSettings(String),

    #[error("failed to serialize render artifact: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a `DatasetWorker` run. Whenever this is returned, no
/// completion signal was published.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("failed to encode message: {0}")]
    Codec(#[from] CodecError),

    #[error("broker operation failed: {0}")]
    Broker(#[from] BrokerError),

    #[error("transform produced category '{found}' for a worker designated to '{expected}'")]
    CategoryMismatch { expected: String, found: String },
}

/// Failure of the completion barrier.
#[derive(Error, Debug)]
pub enum BarrierError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("broker operation failed: {0}")]
    Broker(#[from] BrokerError),

    #[error("barrier timed out after {waited:?}: {received}/{expected} workers completed")]
    Timeout {
        expected: usize,
        received: usize,
        waited: Duration,
    },

    #[error("barrier cancelled: {received}/{expected} workers completed")]
    Cancelled { expected: usize, received: usize },
}

/// Failure of the result aggregator. No result is rendered when this is returned.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("broker operation failed: {0}")]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Barrier(#[from] BarrierError),

    #[error("category '{0}' received more than one batch")]
    DuplicateCategory(String),

    #[error("timed out draining '{category}': {received}/{expected} batches")]
    DrainTimeout {
        category: String,
        received: usize,
        expected: usize,
    },

    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}
