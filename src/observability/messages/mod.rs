// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the event at its level with typed fields.
//!
//! # Organization
//!
//! * `connection` - broker connection attempts and release
//! * `worker` - dataset worker lifecycle
//! * `barrier` - completion barrier progress
//! * `aggregator` - drains, merges and rendering
//! * `dead_letter` - discarded and dead-lettered deliveries
//! * `config` - configuration warnings
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_fan_in::observability::messages::barrier::BarrierReleased;
//! use the_fan_in::observability::messages::StructuredLog;
//! use std::time::Duration;
//!
//! let msg = BarrierReleased {
//!     queue: "completion_queue",
//!     expected: 4,
//!     duration: Duration::from_secs(12),
//! };
//!
//! tracing::info!("{}", msg);
//! let _span = msg.span("barrier");
//! ```

use tracing::Span;

pub mod aggregator;
pub mod barrier;
pub mod config;
pub mod connection;
pub mod dead_letter;
pub mod worker;

/// A log event that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the event at its level with structured fields.
    fn log(&self);

    /// A span carrying the same fields, for work done on behalf of this event.
    fn span(&self, name: &str) -> Span;
}
