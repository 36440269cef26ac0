// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for result aggregation events.
//!
//! This module contains message types for logging events related to:
//! * Draining category queues
//! * Merging batches into the result
//! * Rendering the final result

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;
use tracing::Span;

/// Draining of a category queue started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct DrainStarted<'a> {
    pub category: &'a str,
    pub queue: &'a str,
    pub expected_batches: usize,
}

impl Display for DrainStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Draining '{}' for category '{}' ({} batches expected)",
            self.queue, self.category, self.expected_batches
        )
    }
}

impl StructuredLog for DrainStarted<'_> {
    fn log(&self) {
        tracing::info!(
            category = self.category,
            queue = self.queue,
            expected_batches = self.expected_batches,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "drain",
            span_name = name,
            category = self.category,
            queue = self.queue,
        )
    }
}

/// A batch was merged into the result.
///
/// # Log Level
/// `debug!` - Detailed progress
///
/// # Example
/// ```
/// use the_fan_in::observability::messages::aggregator::BatchMerged;
///
/// let msg = BatchMerged { category: "data", records: 10, received: 1, expected: 1 };
/// assert_eq!(msg.to_string(), "Merged 10 records into 'data' (1/1 batches)");
/// ```
pub struct BatchMerged<'a> {
    pub category: &'a str,
    pub records: usize,
    pub received: usize,
    pub expected: usize,
}

impl Display for BatchMerged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Merged {} records into '{}' ({}/{} batches)",
            self.records, self.category, self.received, self.expected
        )
    }
}

impl StructuredLog for BatchMerged<'_> {
    fn log(&self) {
        tracing::debug!(
            category = self.category,
            records = self.records,
            received = self.received,
            expected = self.expected,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("batch_merged", span_name = name, category = self.category)
    }
}

/// The renderer produced its artifact.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ResultRendered<'a> {
    pub renderer: &'a str,
    pub artifact: &'a Path,
    pub categories: usize,
    pub records: usize,
    pub duration: Duration,
}

impl Display for ResultRendered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rendered {} records across {} categories to {} with {} in {:?}",
            self.records,
            self.categories,
            self.artifact.display(),
            self.renderer,
            self.duration
        )
    }
}

impl StructuredLog for ResultRendered<'_> {
    fn log(&self) {
        tracing::info!(
            renderer = self.renderer,
            artifact = %self.artifact.display(),
            categories = self.categories,
            records = self.records,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "result_rendered",
            span_name = name,
            renderer = self.renderer,
            artifact = %self.artifact.display(),
        )
    }
}

/// Aggregation stopped without rendering.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct AggregationFailed<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for AggregationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Aggregation failed, nothing rendered: {}", self.error)
    }
}

impl StructuredLog for AggregationFailed<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("aggregation_failed", span_name = name)
    }
}
