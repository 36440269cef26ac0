// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::backends::amqp::AmqpBroker;
use crate::backends::local::HistogramRenderer;
use crate::backends::memory::InMemoryBroker;
use crate::config::{BrokerKind, Config};
use crate::engine::{
    CategorySource, CompletionBarrier, ConnectionManager, DatasetWorker, DeadLetterSink,
    ResultAggregator, WorkerAssignment,
};
use crate::errors::{ConfigError, ValidationError};
use crate::traits::{Broker, Codec, Transform};

/// Pipeline runtime builder - wires components from configuration.
///
/// Every component built by one builder shares the same broker handle and
/// codec, so a worker and the aggregator built from the same file always
/// agree on queues and encoding.
///
/// # Examples
///
/// ## Building the aggregator side
/// ```
/// use the_fan_in::backends::memory::InMemoryBroker;
/// use the_fan_in::config::{parse_config, ConfigFormat, RuntimeBuilder};
/// use std::sync::Arc;
///
/// let config = parse_config(
///     r#"
/// categories:
///   - name: data
///     queue: data_queue
/// workers:
///   - id: data-worker
///     category: data
/// "#,
///     ConfigFormat::Yaml,
/// )
/// .unwrap();
///
/// let runtime = RuntimeBuilder::new(&config).with_broker(Arc::new(InMemoryBroker::new()));
/// let aggregator = runtime.aggregator();
/// assert_eq!(aggregator.categories().len(), 1);
/// assert_eq!(runtime.barrier().expected(), 1);
/// ```
pub struct RuntimeBuilder<'a> {
    config: &'a Config,
    broker: Arc<dyn Broker>,
    codec: Arc<dyn Codec>,
    cancel: Option<CancellationToken>,
}

impl<'a> RuntimeBuilder<'a> {
    /// Use the broker selected by `broker.kind`.
    ///
    /// A `memory` broker built here is private to this builder; use
    /// [`RuntimeBuilder::with_broker`] to share one between components.
    pub fn new(config: &'a Config) -> Self {
        let broker: Arc<dyn Broker> = match config.broker.kind {
            BrokerKind::Amqp => Arc::new(AmqpBroker::from_config(&config.broker)),
            BrokerKind::Memory => Arc::new(InMemoryBroker::new()),
        };
        Self {
            config,
            broker,
            codec: config.codec.build(),
            cancel: None,
        }
    }

    pub fn with_broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = broker;
        self
    }

    /// Cancel a waiting barrier when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn connections(&self) -> ConnectionManager {
        ConnectionManager::from_config(
            Arc::clone(&self.broker),
            &self.config.broker,
            &self.config.retry,
        )
    }

    pub fn dead_letters(&self) -> DeadLetterSink {
        DeadLetterSink::new(self.config.dead_letter_queue_spec())
    }

    /// The worker with identity `id` and its assignment.
    pub fn worker(
        &self,
        id: &str,
        transform: Arc<dyn Transform>,
    ) -> Result<(DatasetWorker, WorkerAssignment), ConfigError> {
        let worker = self.config.worker(id)?;
        let category = self.config.category(&worker.category).ok_or_else(|| {
            ConfigError::Invalid(vec![ValidationError::UnknownWorkerCategory {
                worker_id: worker.id.clone(),
                category: worker.category.clone(),
            }])
        })?;

        let assignment = WorkerAssignment {
            partition: worker.partition(category),
            category: category.name.clone(),
            queue: category.queue_spec(),
            completion_queue: self.config.completion_queue_spec(),
        };
        let dataset_worker = DatasetWorker::new(
            worker.id.clone(),
            transform,
            Arc::clone(&self.codec),
            self.connections(),
        );
        Ok((dataset_worker, assignment))
    }

    pub fn barrier(&self) -> CompletionBarrier {
        let barrier = CompletionBarrier::new(
            self.connections(),
            Arc::clone(&self.codec),
            self.config.completion_queue_spec(),
            self.config.expected_completions(),
        )
        .with_timeout(self.config.barrier.timeout())
        .with_dead_letters(self.dead_letters());

        match &self.cancel {
            Some(token) => barrier.with_cancellation(token.clone()),
            None => barrier,
        }
    }

    pub fn category_sources(&self) -> Vec<CategorySource> {
        self.config
            .categories
            .iter()
            .map(|c| {
                CategorySource::new(c.name.clone(), c.queue.clone())
                    .with_expected_batches(c.expected_batches)
            })
            .collect()
    }

    pub fn aggregator(&self) -> ResultAggregator {
        ResultAggregator::new(
            self.connections(),
            Arc::clone(&self.codec),
            self.barrier(),
            self.category_sources(),
        )
        .with_merge_policy(self.config.aggregator.merge_policy)
        .with_drain_timeout(self.config.aggregator.drain_timeout())
        .with_dead_letters(self.dead_letters())
    }

    /// The bundled histogram renderer, writing to `aggregator.output_dir`.
    pub fn histogram_renderer(&self) -> HistogramRenderer {
        HistogramRenderer::new(
            self.config.aggregator.histogram.clone(),
            self.config.aggregator.output_dir.clone(),
        )
    }
}
