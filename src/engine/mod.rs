// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline components.
//!
//! * [`DatasetWorker`] - transforms one partition and publishes its batch, then a completion signal
//! * [`CompletionBarrier`] - waits for a number of distinct workers to signal completion
//! * [`ResultAggregator`] - drains category queues in declared order and renders once
//! * [`ConnectionManager`] - opens broker sessions with bounded retries
//!
//! Components share nothing but the broker; each acquires its own connection.

pub mod aggregator;
pub mod barrier;
pub mod connection;
pub mod dead_letter;
pub mod worker;

#[cfg(test)]
mod integration_tests;

pub use aggregator::{AggregationReport, CategorySource, ResultAggregator};
pub use barrier::{BarrierState, CompletionBarrier, Observation, Release};
pub use connection::{Connection, ConnectionManager, RetryPolicy};
pub use dead_letter::{DeadLetter, DeadLetterSink};
pub use worker::{DatasetWorker, WorkerAssignment, WorkerReport};
