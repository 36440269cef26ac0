// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Completion barrier: wait until every expected worker has finished.
//!
//! The barrier consumes completion signals one at a time and counts
//! **distinct** sender identities. A redelivered or repeated signal from a
//! worker that was already counted is acknowledged and ignored, so
//! at-least-once delivery never releases the barrier early.
//!
//! The barrier releases the moment the last expected worker is seen and stops
//! consuming. Signals still on the completion queue are left there.
//!
//! # State machine
//!
//! ```text
//! WAITING(received_ids) --signal(new id), |ids| < expected--> WAITING
//! WAITING(received_ids) --signal(known id)----------------->  WAITING (acked, not counted)
//! WAITING(received_ids) --signal(new id), |ids| == expected--> RELEASED
//! ```
//!
//! [`BarrierState`] holds this logic without any I/O:
//!
//! ```
//! use the_fan_in::engine::{BarrierState, Observation};
//!
//! let mut state = BarrierState::new(2);
//! assert_eq!(state.observe("data-worker"), Observation::Counted { received: 1 });
//! assert_eq!(state.observe("data-worker"), Observation::Duplicate);
//! assert_eq!(state.observe("signal-worker"), Observation::Released);
//! assert!(state.is_released());
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::engine::connection::ConnectionManager;
use crate::engine::dead_letter::DeadLetterSink;
use crate::errors::BarrierError;
use crate::model::QueueSpec;
use crate::observability::messages::barrier::{
    BarrierReleased, BarrierWaiting, CompletionSignalCounted, DuplicateCompletionSignal,
};
use crate::observability::messages::connection::ConnectionReleaseFailed;
use crate::observability::messages::StructuredLog;
use crate::traits::{BrokerSession, Codec, Delivery};

/// Result of feeding one completion signal to a [`BarrierState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// A new worker was counted; the barrier still waits.
    Counted { received: usize },
    /// The worker was already counted.
    Duplicate,
    /// This signal completed the set; the barrier is released.
    Released,
}

/// Distinct-sender accounting of a barrier.
#[derive(Debug, Clone)]
pub struct BarrierState {
    expected: usize,
    received_ids: HashSet<String>,
    arrival_order: Vec<String>,
}

impl BarrierState {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            received_ids: HashSet::new(),
            arrival_order: Vec::new(),
        }
    }

    /// Record a signal from `sender_id`.
    ///
    /// Once released, further signals are reported as duplicates and the
    /// count never exceeds `expected`.
    pub fn observe(&mut self, sender_id: &str) -> Observation {
        if self.is_released() || self.received_ids.contains(sender_id) {
            return Observation::Duplicate;
        }
        self.received_ids.insert(sender_id.to_string());
        self.arrival_order.push(sender_id.to_string());

        if self.is_released() {
            Observation::Released
        } else {
            Observation::Counted {
                received: self.received_ids.len(),
            }
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received_ids.len()
    }

    pub fn is_released(&self) -> bool {
        self.received_ids.len() >= self.expected
    }

    /// Counted senders in the order their first signal arrived.
    pub fn senders(&self) -> &[String] {
        &self.arrival_order
    }
}

/// Proof that the barrier released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Counted workers in arrival order
    pub senders: Vec<String>,
    pub waited: Duration,
}

/// Waits on the completion queue for a number of distinct workers.
#[derive(Clone)]
pub struct CompletionBarrier {
    connections: ConnectionManager,
    codec: Arc<dyn Codec>,
    queue: QueueSpec,
    expected: usize,
    timeout: Option<Duration>,
    dead_letters: DeadLetterSink,
    cancel: Option<CancellationToken>,
}

impl CompletionBarrier {
    pub fn new(
        connections: ConnectionManager,
        codec: Arc<dyn Codec>,
        queue: QueueSpec,
        expected: usize,
    ) -> Self {
        Self {
            connections,
            codec,
            queue,
            expected,
            timeout: None,
            dead_letters: DeadLetterSink::discard(),
            cancel: None,
        }
    }

    /// Give up with [`BarrierError::Timeout`] after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dead_letters(mut self, dead_letters: DeadLetterSink) -> Self {
        self.dead_letters = dead_letters;
        self
    }

    /// Stop waiting with [`BarrierError::Cancelled`] once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Acquire a connection, wait for release, and close the connection.
    pub async fn wait(&self) -> Result<Release, BarrierError> {
        if self.expected == 0 {
            return Ok(self.released(&BarrierState::new(0), Duration::ZERO));
        }
        let mut connection = self.connections.acquire().await?;
        let release = self.wait_on(&mut *connection).await?;
        if let Err(error) = connection.release().await {
            ConnectionReleaseFailed { error: &error }.log();
        }
        Ok(release)
    }

    /// Wait for release on an already open session.
    pub async fn wait_on(&self, session: &mut dyn BrokerSession) -> Result<Release, BarrierError> {
        let started = Instant::now();
        let mut state = BarrierState::new(self.expected);
        if state.is_released() {
            return Ok(self.released(&state, Duration::ZERO));
        }

        session.declare_queue(&self.queue).await?;
        self.dead_letters.declare(session).await?;
        let waiting = BarrierWaiting {
            queue: &self.queue.name,
            expected: self.expected,
            timeout: self.timeout,
        };
        let span = waiting.span("barrier_wait");
        waiting.log();

        let outcome = self
            .consume(session, &mut state, started)
            .instrument(span)
            .await;
        // Nothing more is read from the completion queue once the wait is over.
        let stopped = session.cancel_consumer(&self.queue.name).await;
        outcome?;
        stopped?;
        Ok(self.released(&state, started.elapsed()))
    }

    /// Consume signals until `state` is released.
    async fn consume(
        &self,
        session: &mut dyn BrokerSession,
        state: &mut BarrierState,
        started: Instant,
    ) -> Result<(), BarrierError> {
        let deadline = self.timeout.map(|timeout| started + timeout);
        loop {
            let delivery = self.next_signal(session, deadline, state, started).await?;

            let signal = match self.codec.decode_signal(&delivery.payload) {
                Ok(signal) => signal,
                Err(err) => {
                    self.dead_letters
                        .reject(session, &delivery, &err.to_string())
                        .await?;
                    continue;
                }
            };

            let observation = state.observe(&signal.sender_id);
            session.ack(&delivery).await?;

            match observation {
                Observation::Duplicate => DuplicateCompletionSignal {
                    sender_id: &signal.sender_id,
                    redelivered: delivery.redelivered,
                }
                .log(),
                Observation::Counted { received } => CompletionSignalCounted {
                    sender_id: &signal.sender_id,
                    received,
                    expected: self.expected,
                }
                .log(),
                Observation::Released => {
                    CompletionSignalCounted {
                        sender_id: &signal.sender_id,
                        received: state.received(),
                        expected: self.expected,
                    }
                    .log();
                    return Ok(());
                }
            }
        }
    }

    async fn next_signal(
        &self,
        session: &mut dyn BrokerSession,
        deadline: Option<Instant>,
        state: &BarrierState,
        started: Instant,
    ) -> Result<Delivery, BarrierError> {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let next = async {
            match deadline {
                Some(deadline) => {
                    tokio::time::timeout_at(deadline, session.next_delivery(&self.queue.name))
                        .await
                        .ok()
                }
                None => Some(session.next_delivery(&self.queue.name).await),
            }
        };

        tokio::select! {
            _ = cancelled => Err(BarrierError::Cancelled {
                expected: state.expected(),
                received: state.received(),
            }),
            next = next => match next {
                Some(delivery) => Ok(delivery?),
                None => Err(BarrierError::Timeout {
                    expected: state.expected(),
                    received: state.received(),
                    waited: started.elapsed(),
                }),
            },
        }
    }

    fn released(&self, state: &BarrierState, waited: Duration) -> Release {
        BarrierReleased {
            queue: &self.queue.name,
            expected: self.expected,
            duration: waited,
        }
        .log();
        Release {
            senders: state.senders().to_vec(),
            waited,
        }
    }
}
