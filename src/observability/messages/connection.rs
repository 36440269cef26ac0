// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for broker connection events.
//!
//! This module contains message types for logging events related to:
//! * Connection attempts and their failures
//! * Retry budget exhaustion
//! * Release of scoped connections

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A connection was established.
///
/// # Log Level
/// `debug!` - Routine event
pub struct ConnectionEstablished<'a> {
    pub broker: &'a str,
    pub attempt: u32,
}

impl Display for ConnectionEstablished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Connected to {} broker on attempt {}",
            self.broker, self.attempt
        )
    }
}

impl StructuredLog for ConnectionEstablished<'_> {
    fn log(&self) {
        tracing::debug!(broker = self.broker, attempt = self.attempt, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "connection",
            span_name = name,
            broker = self.broker,
            attempt = self.attempt,
        )
    }
}

/// A single connection attempt failed; another may follow.
///
/// # Log Level
/// `warn!` - Recoverable problem
///
/// # Example
/// ```
/// use the_fan_in::observability::messages::connection::ConnectionAttemptFailed;
/// use std::time::Duration;
///
/// let error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
/// let msg = ConnectionAttemptFailed {
///     broker: "amqp",
///     attempt: 1,
///     max_attempts: 5,
///     retry_in: Some(Duration::from_secs(5)),
///     error: &error,
/// };
///
/// assert!(msg.to_string().contains("attempt 1/5"));
/// ```
pub struct ConnectionAttemptFailed<'a> {
    pub broker: &'a str,
    pub attempt: u32,
    pub max_attempts: u32,
    /// Delay before the next attempt; `None` on the last one
    pub retry_in: Option<Duration>,
    pub error: &'a dyn std::error::Error,
}

impl Display for ConnectionAttemptFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Connection to {} broker failed (attempt {}/{}): {}",
            self.broker, self.attempt, self.max_attempts, self.error
        )?;
        if let Some(delay) = self.retry_in {
            write!(f, "; retrying in {:?}", delay)?;
        }
        Ok(())
    }
}

impl StructuredLog for ConnectionAttemptFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            broker = self.broker,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            retry_in_ms = self.retry_in.map(|d| d.as_millis() as u64),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "connection_attempt_failed",
            span_name = name,
            broker = self.broker,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
        )
    }
}

/// Every allowed attempt failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ConnectionExhausted<'a> {
    pub broker: &'a str,
    pub attempts: u32,
    pub error: &'a dyn std::error::Error,
}

impl Display for ConnectionExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Giving up on {} broker after {} attempts: {}",
            self.broker, self.attempts, self.error
        )
    }
}

impl StructuredLog for ConnectionExhausted<'_> {
    fn log(&self) {
        tracing::error!(
            broker = self.broker,
            attempts = self.attempts,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "connection_exhausted",
            span_name = name,
            broker = self.broker,
            attempts = self.attempts,
        )
    }
}

/// Closing a connection failed. The broker reclaims it on its own.
///
/// # Log Level
/// `warn!` - Recoverable problem
pub struct ConnectionReleaseFailed<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for ConnectionReleaseFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to close broker connection: {}", self.error)
    }
}

impl StructuredLog for ConnectionReleaseFailed<'_> {
    fn log(&self) {
        tracing::warn!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("connection_release_failed", span_name = name)
    }
}
