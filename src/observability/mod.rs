// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Log events are centralized message types with a `Display` implementation
//! and a [`messages::StructuredLog`] implementation, so call sites never carry
//! format strings and every event has the same fields wherever it is emitted.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::connection` - broker connection attempts, retries and release
//! * `messages::worker` - dataset worker lifecycle and publishes
//! * `messages::barrier` - completion signal accounting
//! * `messages::aggregator` - queue drains, merges and rendering
//! * `messages::dead_letter` - messages that could not be processed
//! * `messages::config` - configuration warnings
//!
//! # Usage
//!
//! ```rust
//! use the_fan_in::observability::messages::worker::BatchPublished;
//! use the_fan_in::observability::messages::StructuredLog;
//!
//! let msg = BatchPublished {
//!     worker_id: "signal-worker",
//!     category: "signal",
//!     queue: "signal_data_queue",
//!     records: 10,
//! };
//!
//! msg.log();
//! ```

pub mod messages;

use std::fmt;
use std::str::FromStr;
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON lines, one event per line
    Json,
    /// Human-readable multi-line output
    #[default]
    Pretty,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}' (expected json or pretty)", other)),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Levels come from `RUST_LOG` and default to `info`. Only the first call
/// installs a subscriber; later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer::layer().pretty())
                    .init();
            }
        }
    });
}

/// Span covering one run of a pipeline component.
///
/// ```rust
/// use the_fan_in::observability::component_span;
///
/// let span = component_span("worker", "signal-worker");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn component_span(component: &str, id: &str) -> Span {
    tracing::info_span!("component", component = component, id = id)
}
