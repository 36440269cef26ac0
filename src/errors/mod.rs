// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod codec;
mod config;
mod connection;
mod pipeline;

pub use codec::CodecError;
pub use config::{ConfigError, ValidationError};
pub use connection::{BrokerError, ConnectionError};
pub use pipeline::{AggregatorError, BarrierError, RenderError, TransformError, WorkerError};
