// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for completion barrier events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// The barrier started waiting for completion signals.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BarrierWaiting<'a> {
    pub queue: &'a str,
    pub expected: usize,
    pub timeout: Option<Duration>,
}

impl Display for BarrierWaiting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Waiting on '{}' for {} workers to complete",
            self.queue, self.expected
        )?;
        match self.timeout {
            Some(timeout) => write!(f, " (timeout {:?})", timeout),
            None => Ok(()),
        }
    }
}

impl StructuredLog for BarrierWaiting<'_> {
    fn log(&self) {
        tracing::info!(
            queue = self.queue,
            expected = self.expected,
            timeout_ms = self.timeout.map(|d| d.as_millis() as u64),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "barrier",
            span_name = name,
            queue = self.queue,
            expected = self.expected,
        )
    }
}

/// A signal from a worker not seen before was counted.
///
/// # Log Level
/// `info!` - Important operational event
pub struct CompletionSignalCounted<'a> {
    pub sender_id: &'a str,
    pub received: usize,
    pub expected: usize,
}

impl Display for CompletionSignalCounted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' completed ({}/{})",
            self.sender_id, self.received, self.expected
        )
    }
}

impl StructuredLog for CompletionSignalCounted<'_> {
    fn log(&self) {
        tracing::info!(
            sender_id = self.sender_id,
            received = self.received,
            expected = self.expected,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "completion_signal",
            span_name = name,
            sender_id = self.sender_id,
        )
    }
}

/// A second signal from an already counted worker was acknowledged and ignored.
///
/// # Log Level
/// `warn!` - Redelivery or a misconfigured worker identity
///
/// # Example
/// ```
/// use the_fan_in::observability::messages::barrier::DuplicateCompletionSignal;
///
/// let msg = DuplicateCompletionSignal { sender_id: "data-worker", redelivered: true };
/// assert!(msg.to_string().contains("data-worker"));
/// ```
pub struct DuplicateCompletionSignal<'a> {
    pub sender_id: &'a str,
    pub redelivered: bool,
}

impl Display for DuplicateCompletionSignal<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring duplicate completion signal from '{}'",
            self.sender_id
        )?;
        if self.redelivered {
            write!(f, " (redelivered)")?;
        }
        Ok(())
    }
}

impl StructuredLog for DuplicateCompletionSignal<'_> {
    fn log(&self) {
        tracing::warn!(
            sender_id = self.sender_id,
            redelivered = self.redelivered,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "duplicate_completion_signal",
            span_name = name,
            sender_id = self.sender_id,
        )
    }
}

/// Every expected worker has completed.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BarrierReleased<'a> {
    pub queue: &'a str,
    pub expected: usize,
    pub duration: Duration,
}

impl Display for BarrierReleased<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "All {} workers completed; barrier on '{}' released after {:?}",
            self.expected, self.queue, self.duration
        )
    }
}

impl StructuredLog for BarrierReleased<'_> {
    fn log(&self) {
        tracing::info!(
            queue = self.queue,
            expected = self.expected,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "barrier_released",
            span_name = name,
            queue = self.queue,
            duration = ?self.duration,
        )
    }
}
