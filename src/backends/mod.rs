// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Broker backends and bundled collaborators.
//!
//! # Broker Backends
//!
//! ## AMQP Backend
//! RabbitMQ (or any AMQP 0-9-1 broker) through `lapin`:
//! - **Durability**: durable queues, persistent delivery mode
//! - **Publisher confirms**: `publish` returns once the broker has the message
//! - **Prefetch**: `basic_qos` bounds unacknowledged deliveries per consumer
//! - **Use Case**: Multi-process deployments
//!
//! ## Memory Backend
//! In-process queues with the same declare/ack/requeue contract:
//! - **Failure injection**: unreachable broker, refused connects, unconfirmed publishes
//! - **Restart simulation**: transient queues and messages disappear
//! - **Use Case**: The `demo` command and tests
//!
//! ## Stub Collaborators (Test-Only)
//! Transforms and renderers with scripted behaviour, only in test builds.
//!
//! # Collaborators
//!
//! `local` holds the bundled [`Transform`](crate::traits::Transform)
//! (JSON partition files) and [`Renderer`](crate::traits::Renderer)
//! (JSON histogram).
//!
//! # Examples
//!
//! ```rust
//! use the_fan_in::backends::{amqp::amqp_uri, memory::InMemoryBroker};
//! use the_fan_in::config::BrokerConfig;
//! use the_fan_in::traits::Broker;
//!
//! let uri = amqp_uri(&BrokerConfig::default());
//! assert_eq!(uri.authority.host, "rabbitmq");
//! assert_eq!(uri.vhost, "/");
//!
//! let broker = InMemoryBroker::new();
//! assert_eq!(broker.name(), "memory");
//! ```

pub mod amqp;
pub mod local;
pub mod memory;
#[cfg(test)]
pub mod stub;
