// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Broker connection acquisition with bounded retries.
//!
//! [`ConnectionManager::acquire`] makes up to `max_attempts` connection
//! attempts, each bounded by the socket timeout, sleeping between attempts
//! according to a [`RetryPolicy`]. The returned [`Connection`] is a scoped
//! handle: call [`Connection::release`] to close it and observe the result,
//! or drop it and the session is closed in the background.
//!
//! # Retry schedule
//!
//! The delay after failed attempt `n` (1-based) is
//! `min(initial_delay * multiplier^(n-1), max_delay)`, plus a random extra of
//! up to `jitter` times that delay. A multiplier of `1.0` with no jitter gives
//! a fixed delay between attempts.
//!
//! ```
//! use the_fan_in::engine::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::fixed(5, Duration::from_secs(5));
//! assert_eq!(policy.delay_after(1), Duration::from_secs(5));
//! assert_eq!(policy.delay_after(4), Duration::from_secs(5));
//! ```

use rand::Rng;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::config::{BrokerConfig, RetryConfig};
use crate::errors::{BrokerError, ConnectionError};
use crate::model::QueueSpec;
use crate::observability::messages::connection::{
    ConnectionAttemptFailed, ConnectionEstablished, ConnectionExhausted, ConnectionReleaseFailed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Broker, BrokerSession, Delivery};

/// How often and how patiently to retry a broker connection.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction (0.0..=1.0) of each delay that may be added at random
    pub jitter: f64,
}

impl RetryPolicy {
    /// The same delay between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jitter = self.jitter.clamp(0.0, 1.0);
        let delay = if jitter > 0.0 {
            capped * (1.0 + rand::thread_rng().gen_range(0.0..=jitter))
        } else {
            capped
        };

        Duration::try_from_secs_f64(delay).unwrap_or(self.max_delay)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.retry_delay_ms)),
            backoff_multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Opens broker sessions, retrying according to a [`RetryPolicy`].
///
/// Cheap to clone; each component acquires its own connection and nothing is
/// pooled between them.
#[derive(Clone)]
pub struct ConnectionManager {
    broker: Arc<dyn Broker>,
    policy: RetryPolicy,
    socket_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(broker: Arc<dyn Broker>, policy: RetryPolicy, socket_timeout: Duration) -> Self {
        Self {
            broker,
            policy,
            socket_timeout,
        }
    }

    pub fn from_config(broker: Arc<dyn Broker>, config: &BrokerConfig, retry: &RetryConfig) -> Self {
        Self::new(broker, RetryPolicy::from(retry), config.socket_timeout())
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn broker_name(&self) -> &'static str {
        self.broker.name()
    }

    /// Open a session, retrying until the attempt budget is spent.
    pub async fn acquire(&self) -> Result<Connection, ConnectionError> {
        let broker = self.broker.name();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match tokio::time::timeout(self.socket_timeout, self.broker.connect()).await
            {
                Ok(Ok(session)) => {
                    ConnectionEstablished { broker, attempt }.log();
                    return Ok(Connection::new(session));
                }
                Ok(Err(err)) => err,
                Err(_) => BrokerError::ConnectTimeout(self.socket_timeout),
            };

            if !self.policy.should_retry(attempt) {
                ConnectionAttemptFailed {
                    broker,
                    attempt,
                    max_attempts: self.policy.max_attempts,
                    retry_in: None,
                    error: &error,
                }
                .log();
                ConnectionExhausted {
                    broker,
                    attempts: attempt,
                    error: &error,
                }
                .log();
                return Err(ConnectionError {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.policy.delay_after(attempt);
            ConnectionAttemptFailed {
                broker,
                attempt,
                max_attempts: self.policy.max_attempts,
                retry_in: Some(delay),
                error: &error,
            }
            .log();
            tokio::time::sleep(delay).await;
        }
    }
}

/// A scoped broker session.
///
/// Dereferences to [`BrokerSession`]. Dropping an unreleased connection
/// closes it on the current tokio runtime.
pub struct Connection {
    session: Box<dyn BrokerSession>,
    released: bool,
}

impl Connection {
    pub fn new(session: Box<dyn BrokerSession>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    /// Close the session. Unacknowledged deliveries return to their queues.
    pub async fn release(mut self) -> Result<(), BrokerError> {
        self.released = true;
        self.session.close().await
    }
}

impl Deref for Connection {
    type Target = dyn BrokerSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut session = std::mem::replace(&mut self.session, Box::new(ReleasedSession));
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(error) = session.close().await {
                    ConnectionReleaseFailed { error: &error }.log();
                }
            });
        }
    }
}

/// Placeholder left behind once a session has been handed off for closing.
struct ReleasedSession;

#[async_trait::async_trait]
impl BrokerSession for ReleasedSession {
    async fn declare_queue(&mut self, _queue: &QueueSpec) -> Result<(), BrokerError> {
        Err(BrokerError::SessionClosed)
    }

    async fn publish(&mut self, _queue: &QueueSpec, _payload: &[u8]) -> Result<(), BrokerError> {
        Err(BrokerError::SessionClosed)
    }

    async fn next_delivery(&mut self, _queue: &str) -> Result<Delivery, BrokerError> {
        Err(BrokerError::SessionClosed)
    }

    async fn cancel_consumer(&mut self, _queue: &str) -> Result<(), BrokerError> {
        Err(BrokerError::SessionClosed)
    }

    async fn ack(&mut self, _delivery: &Delivery) -> Result<(), BrokerError> {
        Err(BrokerError::SessionClosed)
    }

    async fn reject(&mut self, _delivery: &Delivery, _requeue: bool) -> Result<(), BrokerError> {
        Err(BrokerError::SessionClosed)
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        Ok(())
    }
}
