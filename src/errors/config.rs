// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use thiserror::Error;

/// Errors found while validating a pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two categories share a name
    DuplicateCategory {
        /// The duplicated category name
        category: String,
    },
    /// Two queues (category, completion or dead-letter) share a name
    DuplicateQueue {
        /// The duplicated queue name
        queue: String,
    },
    /// A category expects no batches, so its drain could never start
    ZeroExpectedBatches {
        /// The offending category
        category: String,
    },
    /// A category expects several batches but the merge policy rejects a second one
    MultipleBatchesRejected {
        /// The offending category
        category: String,
        /// Batches the category expects
        expected_batches: usize,
    },
    /// The number of workers assigned to a category differs from the batches
    /// its drain waits for; extra batches would stay queued for the next run
    CategoryWorkerCountMismatch {
        /// The offending category
        category: String,
        /// Batches the category expects
        expected_batches: usize,
        /// Workers assigned to the category
        workers: usize,
    },
    /// A worker publishes to a category that is not declared
    UnknownWorkerCategory {
        /// The worker that references the category
        worker_id: String,
        /// The category that couldn't be resolved
        category: String,
    },
    /// Two workers share an identity, so the barrier would count them once
    DuplicateWorkerId {
        /// The duplicate worker ID
        worker_id: String,
    },
    /// The retry budget allows no connection attempt at all
    ZeroConnectionAttempts,
    /// The barrier expects a different number of workers than are configured
    ExpectedWorkerCountMismatch {
        /// Configured barrier threshold
        expected: usize,
        /// Number of workers listed in the configuration
        configured: usize,
    },
}

impl ValidationError {
    /// Warnings are reported but do not fail `load_and_validate_config`.
    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationError::ExpectedWorkerCountMismatch { .. })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateCategory { category } => {
                write!(f, "Duplicate category: '{}'", category)
            }
            ValidationError::DuplicateQueue { queue } => {
                write!(f, "Queue '{}' is declared more than once", queue)
            }
            ValidationError::ZeroExpectedBatches { category } => {
                write!(f, "Category '{}' must expect at least one batch", category)
            }
            ValidationError::MultipleBatchesRejected {
                category,
                expected_batches,
            } => {
                write!(
                    f,
                    "Category '{}' expects {} batches but merge_policy is 'reject'; use 'concatenate'",
                    category, expected_batches
                )
            }
            ValidationError::CategoryWorkerCountMismatch {
                category,
                expected_batches,
                workers,
            } => {
                write!(
                    f,
                    "Category '{}' expects {} batch(es) but {} worker(s) publish to it",
                    category, expected_batches, workers
                )
            }
            ValidationError::UnknownWorkerCategory {
                worker_id,
                category,
            } => {
                write!(
                    f,
                    "Worker '{}' publishes to category '{}' which does not exist",
                    worker_id, category
                )
            }
            ValidationError::DuplicateWorkerId { worker_id } => {
                write!(f, "Duplicate worker ID: '{}'", worker_id)
            }
            ValidationError::ZeroConnectionAttempts => {
                write!(f, "retry.max_attempts must be at least 1")
            }
            ValidationError::ExpectedWorkerCountMismatch {
                expected,
                configured,
            } => {
                write!(
                    f,
                    "Barrier expects {} completion signals but {} workers are configured. \
                     Workers that fail before publishing are never counted, so the aggregator may wait forever.",
                    expected, configured
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for environment variable {name}: '{value}'")]
    InvalidEnv { name: String, value: String },

    #[error("worker '{0}' is not defined in the configuration")]
    UnknownWorker(String),

    #[error("Configuration validation failed:\n{}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
