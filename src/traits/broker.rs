// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::BrokerError;
use crate::model::QueueSpec;

/// A message handed out by a session. It stays unacknowledged on the broker
/// until the same session calls [`BrokerSession::ack`] or
/// [`BrokerSession::reject`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub queue: String,
    pub tag: u64,
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

/// Factory for broker sessions.
///
/// `connect` performs exactly one attempt; retrying is the job of
/// [`crate::engine::ConnectionManager`].
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError>;

    /// Short backend name used in log events.
    fn name(&self) -> &'static str;
}

/// One open connection plus channel toward the broker.
#[async_trait]
pub trait BrokerSession: Send {
    /// Declare a queue, creating it if needed. Re-declaring with different
    /// durability fails.
    async fn declare_queue(&mut self, queue: &QueueSpec) -> Result<(), BrokerError>;

    /// Publish one message and wait until the broker has taken responsibility
    /// for it.
    async fn publish(&mut self, queue: &QueueSpec, payload: &[u8]) -> Result<(), BrokerError>;

    /// Wait until a message is available on `queue` and take it.
    async fn next_delivery(&mut self, queue: &str) -> Result<Delivery, BrokerError>;

    /// Stop receiving messages from `queue`. Deliveries already handed out
    /// stay unacknowledged until acked, rejected or the session closes. Does
    /// nothing if the session is not consuming `queue`.
    async fn cancel_consumer(&mut self, queue: &str) -> Result<(), BrokerError>;

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Reject a message. With `requeue == false` the broker discards it.
    async fn reject(&mut self, delivery: &Delivery, requeue: bool) -> Result<(), BrokerError>;

    /// Stop consuming and close the session. Unacknowledged messages return
    /// to their queues.
    async fn close(&mut self) -> Result<(), BrokerError>;
}
