// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for dataset worker events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A worker started transforming its partition.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_fan_in::observability::messages::worker::WorkerStarted;
///
/// let msg = WorkerStarted {
///     worker_id: "data-worker",
///     category: "data",
///     sources: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct WorkerStarted<'a> {
    pub worker_id: &'a str,
    pub category: &'a str,
    pub sources: usize,
}

impl Display for WorkerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' processing {} sources for category '{}'",
            self.worker_id, self.sources, self.category
        )
    }
}

impl StructuredLog for WorkerStarted<'_> {
    fn log(&self) {
        tracing::info!(
            worker_id = self.worker_id,
            category = self.category,
            sources = self.sources,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "worker",
            span_name = name,
            worker_id = self.worker_id,
            category = self.category,
        )
    }
}

/// A batch was confirmed by the broker.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BatchPublished<'a> {
    pub worker_id: &'a str,
    pub category: &'a str,
    pub queue: &'a str,
    pub records: usize,
}

impl Display for BatchPublished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' published {} '{}' records to '{}'",
            self.worker_id, self.records, self.category, self.queue
        )
    }
}

impl StructuredLog for BatchPublished<'_> {
    fn log(&self) {
        tracing::info!(
            worker_id = self.worker_id,
            category = self.category,
            queue = self.queue,
            records = self.records,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "batch_published",
            span_name = name,
            worker_id = self.worker_id,
            queue = self.queue,
        )
    }
}

/// The worker's completion signal was confirmed by the broker.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerCompleted<'a> {
    pub worker_id: &'a str,
    pub completion_queue: &'a str,
    pub duration: Duration,
}

impl Display for WorkerCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' signalled completion on '{}' after {:?}",
            self.worker_id, self.completion_queue, self.duration
        )
    }
}

impl StructuredLog for WorkerCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            worker_id = self.worker_id,
            completion_queue = self.completion_queue,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "worker_completed",
            span_name = name,
            worker_id = self.worker_id,
            duration = ?self.duration,
        )
    }
}

/// The worker stopped before signalling completion.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct WorkerFailed<'a> {
    pub worker_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for WorkerFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' failed without signalling completion: {}",
            self.worker_id, self.error
        )
    }
}

impl StructuredLog for WorkerFailed<'_> {
    fn log(&self) {
        tracing::error!(worker_id = self.worker_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("worker_failed", span_name = name, worker_id = self.worker_id)
    }
}
