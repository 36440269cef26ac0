// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Result aggregation: barrier, ordered drain, single render.
//!
//! Once the completion barrier has released, every batch the counted workers
//! published is already durably enqueued. The aggregator then drains the
//! category queues **in declared order**, stopping each drain after the
//! category's `expected_batches`, so the result's category order never
//! depends on which worker finished first.
//!
//! A delivery that does not decode, or whose payload category differs from
//! the category declared for its queue, is dead-lettered and not merged.
//! The renderer is called exactly once, and only with a complete result.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

use crate::engine::barrier::{CompletionBarrier, Release};
use crate::engine::connection::ConnectionManager;
use crate::engine::dead_letter::DeadLetterSink;
use crate::errors::AggregatorError;
use crate::model::{MergePolicy, PipelineResult, QueueSpec};
use crate::observability::messages::aggregator::{
    AggregationFailed, BatchMerged, DrainStarted, ResultRendered,
};
use crate::observability::messages::connection::ConnectionReleaseFailed;
use crate::observability::messages::StructuredLog;
use crate::traits::{BrokerSession, Codec, Delivery, Renderer};

/// A category and the queue its batches arrive on.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySource {
    pub category: String,
    pub queue: QueueSpec,
    /// Batches to merge before this category is complete
    pub expected_batches: usize,
}

impl CategorySource {
    /// One batch on a durable queue.
    pub fn new(category: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            queue: QueueSpec::durable(queue),
            expected_batches: 1,
        }
    }

    pub fn with_expected_batches(mut self, expected_batches: usize) -> Self {
        self.expected_batches = expected_batches;
        self
    }
}

/// What one aggregation run produced.
#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub release: Release,
    pub result: PipelineResult,
    pub artifact: std::path::PathBuf,
}

/// Collects every category's batches after the barrier and renders them once.
pub struct ResultAggregator {
    connections: ConnectionManager,
    codec: Arc<dyn Codec>,
    barrier: CompletionBarrier,
    categories: Vec<CategorySource>,
    merge_policy: MergePolicy,
    drain_timeout: Option<Duration>,
    dead_letters: DeadLetterSink,
}

impl ResultAggregator {
    pub fn new(
        connections: ConnectionManager,
        codec: Arc<dyn Codec>,
        barrier: CompletionBarrier,
        categories: Vec<CategorySource>,
    ) -> Self {
        Self {
            connections,
            codec,
            barrier,
            categories,
            merge_policy: MergePolicy::default(),
            drain_timeout: None,
            dead_letters: DeadLetterSink::discard(),
        }
    }

    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    /// Fail a category drain with [`AggregatorError::DrainTimeout`] after `timeout`.
    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Dead-letter undecodable signals and batches. Applies to the embedded
    /// barrier as well.
    pub fn with_dead_letters(mut self, dead_letters: DeadLetterSink) -> Self {
        self.barrier = self.barrier.with_dead_letters(dead_letters.clone());
        self.dead_letters = dead_letters;
        self
    }

    pub fn categories(&self) -> &[CategorySource] {
        &self.categories
    }

    /// Wait for the barrier, then drain every category in declared order.
    pub async fn collect(&self) -> Result<(Release, PipelineResult), AggregatorError> {
        let mut connection = self.connections.acquire().await?;
        let outcome = self.collect_on(&mut *connection).await;
        if let Err(error) = connection.release().await {
            ConnectionReleaseFailed { error: &error }.log();
        }
        outcome
    }

    /// Collect, then hand the complete result to `renderer` exactly once.
    pub async fn run(&self, renderer: &dyn Renderer) -> Result<AggregationReport, AggregatorError> {
        let outcome = self.collect_and_render(renderer).await;
        if let Err(error) = &outcome {
            AggregationFailed { error }.log();
        }
        outcome
    }

    async fn collect_and_render(
        &self,
        renderer: &dyn Renderer,
    ) -> Result<AggregationReport, AggregatorError> {
        let (release, result) = self.collect().await?;

        let started = Instant::now();
        let artifact = renderer.render(&result).await?;
        ResultRendered {
            renderer: renderer.name(),
            artifact: &artifact,
            categories: result.len(),
            records: result.total_records(),
            duration: started.elapsed(),
        }
        .log();

        Ok(AggregationReport {
            release,
            result,
            artifact,
        })
    }

    async fn collect_on(
        &self,
        session: &mut dyn BrokerSession,
    ) -> Result<(Release, PipelineResult), AggregatorError> {
        let release = self.barrier.wait_on(session).await?;
        let result = self.drain(session).await?;
        Ok((release, result))
    }

    /// Drain every declared category. The barrier must already have released.
    pub async fn drain(&self, session: &mut dyn BrokerSession) -> Result<PipelineResult, AggregatorError> {
        self.dead_letters.declare(session).await?;

        let mut result = PipelineResult::new();
        for source in &self.categories {
            self.drain_category(session, source, &mut result).await?;
        }
        Ok(result)
    }

    async fn drain_category(
        &self,
        session: &mut dyn BrokerSession,
        source: &CategorySource,
        result: &mut PipelineResult,
    ) -> Result<(), AggregatorError> {
        session.declare_queue(&source.queue).await?;
        let started = DrainStarted {
            category: &source.category,
            queue: &source.queue.name,
            expected_batches: source.expected_batches,
        };
        let span = started.span("drain");
        started.log();

        self.merge_batches(session, source, result)
            .instrument(span)
            .await
    }

    async fn merge_batches(
        &self,
        session: &mut dyn BrokerSession,
        source: &CategorySource,
        result: &mut PipelineResult,
    ) -> Result<(), AggregatorError> {
        let deadline = self.drain_timeout.map(|timeout| Instant::now() + timeout);
        let mut received = 0;
        while received < source.expected_batches {
            let delivery = self
                .next_batch(session, source, deadline, received)
                .await?;

            let batch = match self.codec.decode_batch(&delivery.payload) {
                Ok(batch) => batch,
                Err(err) => {
                    self.dead_letters
                        .reject(session, &delivery, &err.to_string())
                        .await?;
                    continue;
                }
            };
            if batch.category != source.category {
                let reason = format!(
                    "batch for category '{}' arrived on '{}', which carries '{}'",
                    batch.category, source.queue.name, source.category
                );
                self.dead_letters.reject(session, &delivery, &reason).await?;
                continue;
            }

            let records = batch.len();
            result.merge(batch, self.merge_policy)?;
            session.ack(&delivery).await?;
            received += 1;

            BatchMerged {
                category: &source.category,
                records,
                received,
                expected: source.expected_batches,
            }
            .log();
        }
        session.cancel_consumer(&source.queue.name).await?;
        Ok(())
    }

    async fn next_batch(
        &self,
        session: &mut dyn BrokerSession,
        source: &CategorySource,
        deadline: Option<Instant>,
        received: usize,
    ) -> Result<Delivery, AggregatorError> {
        match deadline {
            None => Ok(session.next_delivery(&source.queue.name).await?),
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, session.next_delivery(&source.queue.name))
                    .await
                {
                    Ok(delivery) => Ok(delivery?),
                    Err(_) => Err(AggregatorError::DrainTimeout {
                        category: source.category.clone(),
                        received,
                        expected: source.expected_batches,
                    }),
                }
            }
        }
    }
}
