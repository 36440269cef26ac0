// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for deliveries that could not be processed.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A delivery could not be processed and left its queue.
///
/// `dead_letter_queue` is `None` when no dead-letter queue is configured and
/// the message was rejected without requeue, which discards it.
///
/// # Log Level
/// `error!` - Data was lost from the pipeline
///
/// # Example
/// ```
/// use the_fan_in::observability::messages::dead_letter::DeliveryRejected;
///
/// let msg = DeliveryRejected {
///     queue: "data_queue",
///     reason: "codec mismatch: expected 'json', found 'protobuf'",
///     dead_letter_queue: None,
/// };
/// assert!(msg.to_string().contains("discarded"));
/// ```
pub struct DeliveryRejected<'a> {
    pub queue: &'a str,
    pub reason: &'a str,
    pub dead_letter_queue: Option<&'a str>,
}

impl Display for DeliveryRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.dead_letter_queue {
            Some(dlq) => write!(
                f,
                "Moved unprocessable message from '{}' to '{}': {}",
                self.queue, dlq, self.reason
            ),
            None => write!(
                f,
                "Unprocessable message on '{}' discarded: {}",
                self.queue, self.reason
            ),
        }
    }
}

impl StructuredLog for DeliveryRejected<'_> {
    fn log(&self) {
        tracing::error!(
            queue = self.queue,
            reason = self.reason,
            dead_letter_queue = self.dead_letter_queue,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "delivery_rejected",
            span_name = name,
            queue = self.queue,
        )
    }
}
