// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process broker with AMQP-like queue semantics.
//!
//! Used by the `demo` command and throughout the test suite. It models the
//! parts of the broker contract the pipeline relies on:
//!
//! * queues must be declared before use, and re-declaring with a different
//!   durability fails
//! * deliveries stay unacknowledged until acked or rejected by the session
//!   that received them; closing a session requeues them (flagged redelivered)
//! * [`InMemoryBroker::restart`] drops transient queues and transient messages
//!
//! Failure injection (unreachable broker, failing publishes) lets tests drive
//! the retry and partial-failure paths.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::errors::BrokerError;
use crate::model::QueueSpec;
use crate::traits::{Broker, BrokerSession, Delivery};

#[derive(Debug, Clone)]
struct StoredMessage {
    payload: Vec<u8>,
    persistent: bool,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    durable: bool,
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, StoredMessage>,
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, QueueState>,
    failing_publishes: HashSet<String>,
    /// queue name -> sessions consuming it
    consumers: HashMap<String, usize>,
    next_tag: u64,
}

struct Shared {
    state: Mutex<State>,
    changed: watch::Sender<u64>,
    generation: AtomicU64,
    reachable: AtomicBool,
    failing_connects: AtomicU32,
    connect_attempts: AtomicU32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.changed.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// Shared handle to an in-process broker. Clones refer to the same queues.
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                changed,
                generation: AtomicU64::new(0),
                reachable: AtomicBool::new(true),
                failing_connects: AtomicU32::new(0),
                connect_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// A broker that refuses every connection.
    pub fn unreachable() -> Self {
        let broker = Self::new();
        broker.set_reachable(false);
        broker
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Refuse the next `count` connection attempts, then accept again.
    pub fn fail_next_connects(&self, count: u32) {
        self.shared.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Every publish to `queue` is negatively acknowledged from now on.
    pub fn fail_publishes_to(&self, queue: impl Into<String>) {
        self.shared.lock().failing_publishes.insert(queue.into());
    }

    /// Total number of `connect` calls, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    /// Messages ready for delivery on `queue`.
    pub fn ready_count(&self, queue: &str) -> usize {
        self.shared
            .lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.ready.len())
    }

    /// Messages delivered but neither acked nor rejected yet.
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.shared
            .lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.unacked.len())
    }

    /// Copies of the payloads ready on `queue`, oldest first.
    pub fn peek(&self, queue: &str) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .queues
            .get(queue)
            .map(|q| q.ready.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Open sessions currently consuming from `queue`.
    pub fn consumer_count(&self, queue: &str) -> usize {
        self.shared.lock().consumers.get(queue).copied().unwrap_or(0)
    }

    pub fn queue_exists(&self, queue: &str) -> bool {
        self.shared.lock().queues.contains_key(queue)
    }

    pub fn is_durable(&self, queue: &str) -> Option<bool> {
        self.shared.lock().queues.get(queue).map(|q| q.durable)
    }

    /// Simulate a broker restart: open sessions become unusable, transient
    /// queues disappear, and durable queues keep only persistent messages.
    /// Unacknowledged persistent messages become ready again.
    pub fn restart(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.shared.lock();
            state.queues.retain(|_, q| q.durable);
            state.consumers.clear();
            for queue in state.queues.values_mut() {
                let mut unacked: Vec<(u64, StoredMessage)> = queue.unacked.drain().collect();
                unacked.sort_by_key(|(tag, _)| *tag);
                for (_, mut message) in unacked.into_iter().rev() {
                    message.redelivered = true;
                    queue.ready.push_front(message);
                }
                queue.ready.retain(|m| m.persistent);
            }
        }
        self.shared.notify();
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.shared.reachable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unreachable("connection refused".to_string()));
        }
        let refused = self
            .shared
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(BrokerError::Unreachable("connection refused".to_string()));
        }

        Ok(Box::new(InMemorySession {
            shared: Arc::clone(&self.shared),
            generation: self.shared.generation.load(Ordering::SeqCst),
            outstanding: HashMap::new(),
            consuming: HashSet::new(),
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// A session on an [`InMemoryBroker`].
pub struct InMemorySession {
    shared: Arc<Shared>,
    generation: u64,
    /// delivery tag -> queue name, for deliveries this session still owns
    outstanding: HashMap<u64, String>,
    /// Queues this session has consumed from
    consuming: HashSet<String>,
    closed: bool,
}

impl InMemorySession {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed || self.generation != self.shared.generation.load(Ordering::SeqCst) {
            return Err(BrokerError::SessionClosed);
        }
        Ok(())
    }

    fn take(&mut self, queue: &str) -> Result<Option<Delivery>, BrokerError> {
        self.ensure_open()?;
        let mut state = self.shared.lock();
        let tag = state.next_tag + 1;
        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;

        let Some(message) = queue_state.ready.pop_front() else {
            return Ok(None);
        };
        let delivery = Delivery {
            queue: queue.to_string(),
            tag,
            payload: message.payload.clone(),
            redelivered: message.redelivered,
        };
        queue_state.unacked.insert(tag, message);
        state.next_tag = tag;
        self.outstanding.insert(tag, queue.to_string());
        Ok(Some(delivery))
    }

    fn settle(&mut self, delivery: &Delivery, requeue: bool) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let queue = self.outstanding.remove(&delivery.tag).ok_or_else(|| {
            BrokerError::Protocol(format!("unknown delivery tag {}", delivery.tag))
        })?;

        {
            let mut state = self.shared.lock();
            if let Some(queue_state) = state.queues.get_mut(&queue) {
                if let Some(mut message) = queue_state.unacked.remove(&delivery.tag) {
                    if requeue {
                        message.redelivered = true;
                        queue_state.ready.push_front(message);
                    }
                }
            }
        }
        if requeue {
            self.shared.notify();
        }
        Ok(())
    }

    fn start_consuming(&mut self, queue: &str) {
        if self.consuming.insert(queue.to_string()) {
            *self.shared.lock().consumers.entry(queue.to_string()).or_insert(0) += 1;
        }
    }

    fn stop_consuming(&mut self, queue: &str) {
        if !self.consuming.remove(queue)
            || self.generation != self.shared.generation.load(Ordering::SeqCst)
        {
            return;
        }
        let mut state = self.shared.lock();
        if let Some(count) = state.consumers.get_mut(queue) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.consumers.remove(queue);
            }
        }
    }

    fn stop_all_consumers(&mut self) {
        let queues: Vec<String> = self.consuming.iter().cloned().collect();
        for queue in queues {
            self.stop_consuming(&queue);
        }
    }

    fn requeue_outstanding(&mut self) {
        if self.outstanding.is_empty() {
            return;
        }
        if self.generation == self.shared.generation.load(Ordering::SeqCst) {
            let mut tags: Vec<(u64, String)> = self.outstanding.drain().collect();
            tags.sort_by_key(|(tag, _)| *tag);

            let mut state = self.shared.lock();
            for (tag, queue) in tags.into_iter().rev() {
                if let Some(queue_state) = state.queues.get_mut(&queue) {
                    if let Some(mut message) = queue_state.unacked.remove(&tag) {
                        message.redelivered = true;
                        queue_state.ready.push_front(message);
                    }
                }
            }
        }
        self.outstanding.clear();
        self.shared.notify();
    }
}

#[async_trait]
impl BrokerSession for InMemorySession {
    async fn declare_queue(&mut self, queue: &QueueSpec) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut state = self.shared.lock();
        match state.queues.get(&queue.name) {
            Some(existing) if existing.durable != queue.durable => {
                Err(BrokerError::DeclarationMismatch {
                    queue: queue.name.clone(),
                    existing: existing.durable,
                })
            }
            Some(_) => Ok(()),
            None => {
                state.queues.insert(
                    queue.name.clone(),
                    QueueState {
                        durable: queue.durable,
                        ..QueueState::default()
                    },
                );
                Ok(())
            }
        }
    }

    async fn publish(&mut self, queue: &QueueSpec, payload: &[u8]) -> Result<(), BrokerError> {
        self.ensure_open()?;
        {
            let mut state = self.shared.lock();
            if state.failing_publishes.contains(&queue.name) {
                return Err(BrokerError::PublishNotConfirmed(queue.name.clone()));
            }
            let queue_state = state
                .queues
                .get_mut(&queue.name)
                .ok_or_else(|| BrokerError::QueueNotFound(queue.name.clone()))?;
            queue_state.ready.push_back(StoredMessage {
                payload: payload.to_vec(),
                persistent: queue.persistent_delivery,
                redelivered: false,
            });
        }
        self.shared.notify();
        Ok(())
    }

    async fn next_delivery(&mut self, queue: &str) -> Result<Delivery, BrokerError> {
        self.ensure_open()?;
        self.start_consuming(queue);
        let mut changes = self.shared.changed.subscribe();
        loop {
            if let Some(delivery) = self.take(queue)? {
                return Ok(delivery);
            }
            changes
                .changed()
                .await
                .map_err(|_| BrokerError::ConsumerClosed(queue.to_string()))?;
        }
    }

    async fn cancel_consumer(&mut self, queue: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.stop_consuming(queue);
        Ok(())
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.settle(delivery, false)
    }

    async fn reject(&mut self, delivery: &Delivery, requeue: bool) -> Result<(), BrokerError> {
        self.settle(delivery, requeue)
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if self.closed {
            return Ok(());
        }
        self.stop_all_consumers();
        self.requeue_outstanding();
        self.closed = true;
        Ok(())
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        if !self.closed {
            self.stop_all_consumers();
            self.requeue_outstanding();
        }
    }
}
