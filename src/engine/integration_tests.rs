// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cross-component tests: workers, barrier and aggregator on one in-memory broker.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::backends::memory::InMemoryBroker;
use crate::backends::stub::{FailingRenderer, FailingTransform, RecordingRenderer, StubTransform};
use crate::codec::CodecKind;
use crate::engine::{
    CategorySource, CompletionBarrier, ConnectionManager, DatasetWorker, DeadLetter,
    DeadLetterSink, ResultAggregator, RetryPolicy, WorkerAssignment,
};
use crate::errors::{AggregatorError, BarrierError, BrokerError, WorkerError};
use crate::model::{CompletionSignal, MergePolicy, Partition, QueueSpec, Record, RecordBatch};
use crate::traits::{Broker, Codec, Transform};

const COMPLETION_QUEUE: &str = "completion_queue";
const DEAD_LETTER_QUEUE: &str = "dead_letter_queue";

const CATEGORIES: [(&str, &str); 4] = [
    ("data", "data_queue"),
    ("background_zt", "background_zt_queue"),
    ("background_zz", "background_zz_queue"),
    ("signal", "signal_data_queue"),
];

fn connections(broker: &InMemoryBroker) -> ConnectionManager {
    ConnectionManager::new(
        Arc::new(broker.clone()),
        RetryPolicy::fixed(3, Duration::from_millis(10)),
        Duration::from_secs(1),
    )
}

fn assignment(worker_id: &str, category: &str, queue: &str) -> WorkerAssignment {
    WorkerAssignment {
        partition: Partition::new(worker_id, vec![format!("{}.json", worker_id)]),
        category: category.to_string(),
        queue: QueueSpec::durable(queue),
        completion_queue: QueueSpec::durable(COMPLETION_QUEUE),
    }
}

fn worker(broker: &InMemoryBroker, id: &str, transform: Arc<dyn Transform>, codec: CodecKind) -> DatasetWorker {
    DatasetWorker::new(id, transform, codec.build(), connections(broker))
}

fn barrier(broker: &InMemoryBroker, codec: CodecKind, expected: usize) -> CompletionBarrier {
    CompletionBarrier::new(
        connections(broker),
        codec.build(),
        QueueSpec::durable(COMPLETION_QUEUE),
        expected,
    )
}

fn aggregator(
    broker: &InMemoryBroker,
    codec: CodecKind,
    expected: usize,
    categories: Vec<CategorySource>,
) -> ResultAggregator {
    ResultAggregator::new(
        connections(broker),
        codec.build(),
        barrier(broker, codec, expected),
        categories,
    )
}

fn all_categories() -> Vec<CategorySource> {
    CATEGORIES
        .iter()
        .map(|(category, queue)| CategorySource::new(*category, *queue))
        .collect()
}

/// Publish raw bytes to a durable queue.
async fn publish_raw(broker: &InMemoryBroker, queue: &str, payload: &[u8]) {
    let spec = QueueSpec::durable(queue);
    let mut session = broker.connect().await.unwrap();
    session.declare_queue(&spec).await.unwrap();
    session.publish(&spec, payload).await.unwrap();
    session.close().await.unwrap();
}

async fn publish_signal(broker: &InMemoryBroker, codec: &dyn Codec, sender_id: &str) {
    let payload = codec.encode_signal(&CompletionSignal::now(sender_id)).unwrap();
    publish_raw(broker, COMPLETION_QUEUE, &payload).await;
}

#[tokio::test]
async fn test_four_workers_fan_in_to_a_single_render() {
    for codec in [CodecKind::Json, CodecKind::Protobuf] {
        let broker = InMemoryBroker::new();
        let renderer = RecordingRenderer::new();
        let aggregator = aggregator(&broker, codec, 4, all_categories());

        let collecting = {
            let renderer = renderer.clone();
            tokio::spawn(async move { aggregator.run(&renderer).await })
        };

        // Finish in reverse declared order.
        for (category, queue) in CATEGORIES.iter().rev() {
            let id = format!("{}-worker", category);
            let report = worker(&broker, &id, Arc::new(StubTransform::new(10)), codec)
                .run(&assignment(&id, category, queue))
                .await
                .unwrap();
            assert_eq!(report.records, 10);
        }

        let report = tokio::time::timeout(Duration::from_secs(5), collecting)
            .await
            .expect("aggregation should finish")
            .unwrap()
            .unwrap();

        let calls = renderer.calls();
        assert_eq!(calls.len(), 1);
        let rendered = &calls[0];
        assert_eq!(rendered.len(), 4);
        assert_eq!(rendered.total_records(), 40);
        assert_eq!(
            rendered.categories().collect::<Vec<_>>(),
            vec!["data", "background_zt", "background_zz", "signal"]
        );
        assert_eq!(report.release.senders.len(), 4);
        assert_eq!(report.release.senders[0], "signal-worker");

        for (_, queue) in CATEGORIES {
            assert_eq!(broker.ready_count(queue), 0);
            assert_eq!(broker.unacked_count(queue), 0);
        }
    }
}

#[tokio::test]
async fn test_barrier_counts_distinct_senders_and_stops_consuming() {
    let broker = InMemoryBroker::new();
    let codec = CodecKind::Json.build();
    for sender in ["w1", "w1", "w2", "w3"] {
        publish_signal(&broker, codec.as_ref(), sender).await;
    }

    let release = barrier(&broker, CodecKind::Json, 2).wait().await.unwrap();

    assert_eq!(release.senders, vec!["w1", "w2"]);
    assert_eq!(broker.ready_count(COMPLETION_QUEUE), 1);
    assert_eq!(broker.unacked_count(COMPLETION_QUEUE), 0);
}

#[tokio::test]
async fn test_released_barrier_cancels_its_consumer_before_the_drain() {
    let broker = InMemoryBroker::new();
    let codec = CodecKind::Json.build();
    for sender in ["w1", "w2", "w3"] {
        publish_signal(&broker, codec.as_ref(), sender).await;
    }

    let mut session = broker.connect().await.unwrap();
    let release = barrier(&broker, CodecKind::Json, 2)
        .wait_on(session.as_mut())
        .await
        .unwrap();

    assert_eq!(release.senders, vec!["w1", "w2"]);
    assert_eq!(broker.consumer_count(COMPLETION_QUEUE), 0);
    assert_eq!(broker.ready_count(COMPLETION_QUEUE), 1);
    assert_eq!(broker.unacked_count(COMPLETION_QUEUE), 0);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_redelivered_signals_never_release_the_barrier() {
    let broker = InMemoryBroker::new();
    let codec = CodecKind::Json.build();
    for _ in 0..5 {
        publish_signal(&broker, codec.as_ref(), "w1").await;
    }

    let err = barrier(&broker, CodecKind::Json, 2)
        .with_timeout(Some(Duration::from_millis(100)))
        .wait()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BarrierError::Timeout {
            expected: 2,
            received: 1,
            ..
        }
    ));
    assert_eq!(broker.ready_count(COMPLETION_QUEUE), 0);
}

#[tokio::test]
async fn test_zero_expected_releases_without_touching_the_broker() {
    let broker = InMemoryBroker::unreachable();

    let release = barrier(&broker, CodecKind::Json, 0).wait().await.unwrap();

    assert!(release.senders.is_empty());
    assert_eq!(broker.connect_attempts(), 0);
}

#[tokio::test]
async fn test_undecodable_signal_is_dead_lettered_and_not_counted() {
    let broker = InMemoryBroker::new();
    publish_raw(&broker, COMPLETION_QUEUE, b"\x00\x01 not a signal").await;
    publish_signal(&broker, CodecKind::Json.build().as_ref(), "w1").await;

    let release = barrier(&broker, CodecKind::Json, 1)
        .with_dead_letters(DeadLetterSink::new(Some(QueueSpec::durable(DEAD_LETTER_QUEUE))))
        .wait()
        .await
        .unwrap();

    assert_eq!(release.senders, vec!["w1"]);
    let parked = broker.peek(DEAD_LETTER_QUEUE);
    assert_eq!(parked.len(), 1);
    let record: DeadLetter = serde_json::from_slice(&parked[0]).unwrap();
    assert_eq!(record.source_queue, COMPLETION_QUEUE);
    assert_eq!(record.payload().unwrap(), b"\x00\x01 not a signal".to_vec());
}

#[tokio::test]
async fn test_cancelled_barrier_reports_progress() {
    let broker = InMemoryBroker::new();
    publish_signal(&broker, CodecKind::Json.build().as_ref(), "w1").await;
    let token = CancellationToken::new();

    let waiting = {
        let barrier = barrier(&broker, CodecKind::Json, 3).with_cancellation(token.clone());
        tokio::spawn(async move { barrier.wait().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        BarrierError::Cancelled {
            expected: 3,
            received: 1
        }
    ));
}

#[tokio::test]
async fn test_misrouted_batch_is_isolated_from_its_queue_category() {
    let broker = InMemoryBroker::new();
    let codec = CodecKind::Json.build();
    let stray = RecordBatch::new("signal", vec![Record::new(125.0, 0.1)]);
    publish_raw(&broker, "data_queue", &codec.encode_batch(&stray).unwrap()).await;
    let data = RecordBatch::new("data", vec![Record::unweighted(91.0)]);
    publish_raw(&broker, "data_queue", &codec.encode_batch(&data).unwrap()).await;
    publish_signal(&broker, codec.as_ref(), "data-worker").await;

    let renderer = RecordingRenderer::new();
    aggregator(&broker, CodecKind::Json, 1, vec![CategorySource::new("data", "data_queue")])
        .with_dead_letters(DeadLetterSink::new(Some(QueueSpec::durable(DEAD_LETTER_QUEUE))))
        .run(&renderer)
        .await
        .unwrap();

    let rendered = &renderer.calls()[0];
    assert_eq!(rendered.categories().collect::<Vec<_>>(), vec!["data"]);
    assert_eq!(rendered.get("data").unwrap().records, vec![Record::unweighted(91.0)]);
    assert!(!rendered.contains("signal"));
    assert_eq!(broker.peek(DEAD_LETTER_QUEUE).len(), 1);
}

#[tokio::test]
async fn test_failed_transform_publishes_nothing() {
    let broker = InMemoryBroker::new();

    let err = worker(&broker, "data-worker", Arc::new(FailingTransform), CodecKind::Json)
        .run(&assignment("data-worker", "data", "data_queue"))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Transform(_)));
    assert_eq!(broker.connect_attempts(), 0);
    assert_eq!(broker.ready_count(COMPLETION_QUEUE), 0);
}

#[tokio::test]
async fn test_unconfirmed_publish_sends_no_completion_signal() {
    let broker = InMemoryBroker::new();
    broker.fail_publishes_to("data_queue");

    let err = worker(&broker, "data-worker", Arc::new(StubTransform::new(10)), CodecKind::Json)
        .run(&assignment("data-worker", "data", "data_queue"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Broker(BrokerError::PublishNotConfirmed(_))
    ));
    assert_eq!(broker.ready_count(COMPLETION_QUEUE), 0);
}

#[tokio::test]
async fn test_worker_rejects_batch_for_another_category() {
    let broker = InMemoryBroker::new();

    let err = worker(
        &broker,
        "data-worker",
        Arc::new(StubTransform::mislabelled(10, "signal")),
        CodecKind::Json,
    )
    .run(&assignment("data-worker", "data", "data_queue"))
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        WorkerError::CategoryMismatch { ref expected, ref found } if expected == "data" && found == "signal"
    ));
    assert!(!broker.queue_exists("data_queue"));
}

#[tokio::test]
async fn test_connection_budget_is_exhausted_after_max_attempts() {
    let broker = InMemoryBroker::unreachable();
    let delay = Duration::from_millis(40);
    let manager = ConnectionManager::new(
        Arc::new(broker.clone()),
        RetryPolicy::fixed(3, delay),
        Duration::from_secs(1),
    );
    let started = Instant::now();

    let err = DatasetWorker::new(
        "data-worker",
        Arc::new(StubTransform::new(10)),
        CodecKind::Json.build(),
        manager,
    )
    .run(&assignment("data-worker", "data", "data_queue"))
    .await
    .unwrap_err();

    match err {
        WorkerError::Connection(err) => assert_eq!(err.attempts, 3),
        other => panic!("expected connection error, got {}", other),
    }
    assert_eq!(broker.connect_attempts(), 3);
    assert!(started.elapsed() >= delay * 2);
}

#[tokio::test]
async fn test_second_batch_is_rejected_or_concatenated_by_policy() {
    for policy in [MergePolicy::Reject, MergePolicy::Concatenate] {
        let broker = InMemoryBroker::new();
        for id in ["data-a", "data-b"] {
            worker(&broker, id, Arc::new(StubTransform::new(10)), CodecKind::Json)
                .run(&assignment(id, "data", "data_queue"))
                .await
                .unwrap();
        }

        let renderer = RecordingRenderer::new();
        let outcome = aggregator(
            &broker,
            CodecKind::Json,
            2,
            vec![CategorySource::new("data", "data_queue").with_expected_batches(2)],
        )
        .with_merge_policy(policy)
        .run(&renderer)
        .await;

        match policy {
            MergePolicy::Reject => {
                assert!(matches!(outcome, Err(AggregatorError::DuplicateCategory(c)) if c == "data"));
                assert!(renderer.calls().is_empty());
                assert_eq!(broker.ready_count("data_queue"), 1);
            }
            MergePolicy::Concatenate => {
                let report = outcome.unwrap();
                assert_eq!(report.result.get("data").unwrap().len(), 20);
                assert_eq!(renderer.calls().len(), 1);
            }
        }
    }
}

#[tokio::test]
async fn test_drain_timeout_renders_nothing() {
    let broker = InMemoryBroker::new();
    worker(&broker, "data-worker", Arc::new(StubTransform::new(10)), CodecKind::Json)
        .run(&assignment("data-worker", "data", "data_queue"))
        .await
        .unwrap();
    // The signal arrives but the signal batch never does.
    publish_signal(&broker, CodecKind::Json.build().as_ref(), "signal-worker").await;

    let renderer = RecordingRenderer::new();
    let err = aggregator(
        &broker,
        CodecKind::Json,
        2,
        vec![
            CategorySource::new("data", "data_queue"),
            CategorySource::new("signal", "signal_data_queue"),
        ],
    )
    .with_drain_timeout(Some(Duration::from_millis(100)))
    .run(&renderer)
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        AggregatorError::DrainTimeout { ref category, received: 0, expected: 1 } if category == "signal"
    ));
    assert!(renderer.calls().is_empty());
}

#[tokio::test]
async fn test_codec_disagreement_is_dead_lettered_not_merged() {
    let broker = InMemoryBroker::new();
    worker(&broker, "data-worker", Arc::new(StubTransform::new(10)), CodecKind::Protobuf)
        .run(&assignment("data-worker", "data", "data_queue"))
        .await
        .unwrap();
    // The aggregator's codec can still read this one.
    publish_signal(&broker, CodecKind::Json.build().as_ref(), "data-worker").await;

    let renderer = RecordingRenderer::new();
    let err = aggregator(&broker, CodecKind::Json, 1, vec![CategorySource::new("data", "data_queue")])
        .with_dead_letters(DeadLetterSink::new(Some(QueueSpec::durable(DEAD_LETTER_QUEUE))))
        .with_drain_timeout(Some(Duration::from_millis(100)))
        .run(&renderer)
        .await
        .unwrap_err();

    assert!(matches!(err, AggregatorError::DrainTimeout { .. }));
    let parked: Vec<DeadLetter> = broker
        .peek(DEAD_LETTER_QUEUE)
        .iter()
        .map(|p| serde_json::from_slice(p).unwrap())
        .collect();
    let mut sources: Vec<&str> = parked.iter().map(|d| d.source_queue.as_str()).collect();
    sources.sort_unstable();
    assert_eq!(sources, vec![COMPLETION_QUEUE, "data_queue"]);
}

#[tokio::test]
async fn test_render_failure_is_reported() {
    let broker = InMemoryBroker::new();
    worker(&broker, "data-worker", Arc::new(StubTransform::new(3)), CodecKind::Json)
        .run(&assignment("data-worker", "data", "data_queue"))
        .await
        .unwrap();

    let err = aggregator(&broker, CodecKind::Json, 1, vec![CategorySource::new("data", "data_queue")])
        .run(&FailingRenderer)
        .await
        .unwrap_err();

    assert!(matches!(err, AggregatorError::Render(_)));
}
