// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dataset worker: transform one partition, publish one batch, signal completion.
//!
//! The completion signal is the worker's promise that its batch is durably
//! enqueued, so it is published only after the broker has confirmed the
//! batch. Any failure before that point (transform, codec, connection or
//! publish) ends the run without a signal, and the barrier never counts the
//! worker.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

use crate::engine::connection::ConnectionManager;
use crate::errors::WorkerError;
use crate::model::{CompletionSignal, Partition, QueueSpec};
use crate::observability::messages::connection::ConnectionReleaseFailed;
use crate::observability::messages::worker::{
    BatchPublished, WorkerCompleted, WorkerFailed, WorkerStarted,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Codec, Transform};

/// Everything a worker needs to know about its slice of the job.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerAssignment {
    pub partition: Partition,
    /// Category the worker is designated to produce
    pub category: String,
    /// Queue the batch is published to
    pub queue: QueueSpec,
    pub completion_queue: QueueSpec,
}

/// Summary of a successful worker run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub worker_id: String,
    pub category: String,
    pub queue: String,
    pub records: usize,
    pub duration: Duration,
}

/// Runs the transform for one partition and publishes the outcome.
pub struct DatasetWorker {
    id: String,
    transform: Arc<dyn Transform>,
    codec: Arc<dyn Codec>,
    connections: ConnectionManager,
}

impl DatasetWorker {
    pub fn new(
        id: impl Into<String>,
        transform: Arc<dyn Transform>,
        codec: Arc<dyn Codec>,
        connections: ConnectionManager,
    ) -> Self {
        Self {
            id: id.into(),
            transform,
            codec,
            connections,
        }
    }

    /// Identity sent in the completion signal.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn run(&self, assignment: &WorkerAssignment) -> Result<WorkerReport, WorkerError> {
        let started = Instant::now();
        let start_msg = WorkerStarted {
            worker_id: &self.id,
            category: &assignment.category,
            sources: assignment.partition.sources.len(),
        };
        let span = start_msg.span("worker_run");
        start_msg.log();

        match self.publish(assignment).instrument(span).await {
            Ok(records) => {
                let duration = started.elapsed();
                WorkerCompleted {
                    worker_id: &self.id,
                    completion_queue: &assignment.completion_queue.name,
                    duration,
                }
                .log();
                Ok(WorkerReport {
                    worker_id: self.id.clone(),
                    category: assignment.category.clone(),
                    queue: assignment.queue.name.clone(),
                    records,
                    duration,
                })
            }
            Err(error) => {
                WorkerFailed {
                    worker_id: &self.id,
                    error: &error,
                }
                .log();
                Err(error)
            }
        }
    }

    async fn publish(&self, assignment: &WorkerAssignment) -> Result<usize, WorkerError> {
        let batch = self
            .transform
            .transform(&assignment.partition, &assignment.category)
            .await?;
        if batch.category != assignment.category {
            return Err(WorkerError::CategoryMismatch {
                expected: assignment.category.clone(),
                found: batch.category,
            });
        }
        let payload = self.codec.encode_batch(&batch)?;

        let mut connection = self.connections.acquire().await?;
        connection.declare_queue(&assignment.queue).await?;
        connection.publish(&assignment.queue, &payload).await?;
        BatchPublished {
            worker_id: &self.id,
            category: &batch.category,
            queue: &assignment.queue.name,
            records: batch.len(),
        }
        .log();

        let signal = self.codec.encode_signal(&CompletionSignal::now(&self.id))?;
        connection.declare_queue(&assignment.completion_queue).await?;
        connection
            .publish(&assignment.completion_queue, &signal)
            .await?;

        if let Err(error) = connection.release().await {
            ConnectionReleaseFailed { error: &error }.log();
        }
        Ok(batch.len())
    }
}
