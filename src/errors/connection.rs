// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while talking to the message broker.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single broker operation on an open (or opening) session.
///
/// Backends map their native protocol errors into this type so the engine
/// never depends on a particular client library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    /// The broker could not be reached or refused the handshake.
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    /// Opening the connection did not finish within the socket timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A queue was used before being declared.
    #[error("queue '{0}' does not exist")]
    QueueNotFound(String),

    /// A queue was re-declared with different properties.
    #[error("queue '{queue}' already declared with durable={existing}")]
    DeclarationMismatch { queue: String, existing: bool },

    /// The broker negatively acknowledged a publish.
    #[error("publish to '{0}' was not confirmed by the broker")]
    PublishNotConfirmed(String),

    /// The delivery stream for a queue ended while a message was expected.
    #[error("consumer for '{0}' was closed by the broker")]
    ConsumerClosed(String),

    /// The session was already released.
    #[error("session already released")]
    SessionClosed,

    /// Any other protocol or channel level failure.
    #[error("broker protocol error: {0}")]
    Protocol(String),
}

impl From<lapin::Error> for BrokerError {
    fn from(err: lapin::Error) -> Self {
        match err {
            lapin::Error::IOError(io) => BrokerError::Unreachable(io.to_string()),
            other => BrokerError::Protocol(other.to_string()),
        }
    }
}

/// The broker stayed unreachable for the whole retry budget.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to connect to broker after {attempts} attempt(s): {last_error}")]
pub struct ConnectionError {
    pub attempts: u32,
    pub last_error: BrokerError,
}
