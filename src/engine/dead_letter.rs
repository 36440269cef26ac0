// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Removal of deliveries that cannot be processed.
//!
//! With a dead-letter queue configured, the original payload is wrapped in a
//! [`DeadLetter`] record (payload base64-encoded, since it may be a binary
//! frame from a foreign codec) and published there before the original is
//! acknowledged. Without one, the delivery is rejected without requeue and
//! the broker discards it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::BrokerError;
use crate::model::QueueSpec;
use crate::observability::messages::dead_letter::DeliveryRejected;
use crate::observability::messages::StructuredLog;
use crate::traits::{BrokerSession, Delivery};

/// What is published to the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub source_queue: String,
    pub reason: String,
    pub redelivered: bool,
    pub payload_base64: String,
}

impl DeadLetter {
    pub fn new(delivery: &Delivery, reason: impl Into<String>) -> Self {
        Self {
            source_queue: delivery.queue.clone(),
            reason: reason.into(),
            redelivered: delivery.redelivered,
            payload_base64: STANDARD.encode(&delivery.payload),
        }
    }

    /// The original payload bytes.
    pub fn payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.payload_base64)
    }
}

/// Where unprocessable deliveries go.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterSink {
    queue: Option<QueueSpec>,
}

impl DeadLetterSink {
    pub fn new(queue: Option<QueueSpec>) -> Self {
        Self { queue }
    }

    /// Rejected deliveries are dropped by the broker.
    pub fn discard() -> Self {
        Self { queue: None }
    }

    pub fn queue(&self) -> Option<&QueueSpec> {
        self.queue.as_ref()
    }

    pub async fn declare(&self, session: &mut dyn BrokerSession) -> Result<(), BrokerError> {
        match &self.queue {
            Some(queue) => session.declare_queue(queue).await,
            None => Ok(()),
        }
    }

    /// Take `delivery` off its queue for good, recording `reason`.
    pub async fn reject(
        &self,
        session: &mut dyn BrokerSession,
        delivery: &Delivery,
        reason: &str,
    ) -> Result<(), BrokerError> {
        DeliveryRejected {
            queue: &delivery.queue,
            reason,
            dead_letter_queue: self.queue.as_ref().map(|q| q.name.as_str()),
        }
        .log();

        match &self.queue {
            Some(queue) => {
                let record = serde_json::to_vec(&DeadLetter::new(delivery, reason))
                    .map_err(|err| BrokerError::Protocol(err.to_string()))?;
                session.publish(queue, &record).await?;
                session.ack(delivery).await
            }
            None => session.reject(delivery, false).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::InMemoryBroker;
    use crate::traits::Broker;

    async fn delivered(broker: &InMemoryBroker, payload: &[u8]) -> (Box<dyn BrokerSession>, Delivery) {
        let queue = QueueSpec::durable("data_queue");
        let mut session = broker.connect().await.unwrap();
        session.declare_queue(&queue).await.unwrap();
        session.publish(&queue, payload).await.unwrap();
        let delivery = session.next_delivery("data_queue").await.unwrap();
        (session, delivery)
    }

    #[tokio::test]
    async fn test_dead_letter_keeps_original_payload() {
        let broker = InMemoryBroker::new();
        let (mut session, delivery) = delivered(&broker, &[0xde, 0xad, 0xbe, 0xef]).await;
        let sink = DeadLetterSink::new(Some(QueueSpec::durable("dead_letter_queue")));
        sink.declare(session.as_mut()).await.unwrap();

        sink.reject(session.as_mut(), &delivery, "malformed payload")
            .await
            .unwrap();

        assert_eq!(broker.unacked_count("data_queue"), 0);
        let parked = broker.peek("dead_letter_queue");
        assert_eq!(parked.len(), 1);
        let record: DeadLetter = serde_json::from_slice(&parked[0]).unwrap();
        assert_eq!(record.source_queue, "data_queue");
        assert_eq!(record.reason, "malformed payload");
        assert_eq!(record.payload().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[tokio::test]
    async fn test_discard_rejects_without_requeue() {
        let broker = InMemoryBroker::new();
        let (mut session, delivery) = delivered(&broker, b"not a batch").await;

        DeadLetterSink::discard()
            .reject(session.as_mut(), &delivery, "malformed payload")
            .await
            .unwrap();
        session.close().await.unwrap();

        assert_eq!(broker.ready_count("data_queue"), 0);
        assert_eq!(broker.unacked_count("data_queue"), 0);
    }
}
