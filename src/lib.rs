// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // broker backends + bundled collaborators
pub mod codec;      // wire encodings
pub mod config;     // config loading, validation, runtime wiring
pub mod engine;     // worker, barrier, aggregator
pub mod errors;     // error handling
pub mod model;      // batches, signals, results
pub mod observability;
pub mod proto;      // protobuf wire messages
pub mod traits;     // broker, codec and collaborator seams
