// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! AMQP 0-9-1 backend (RabbitMQ) built on `lapin`.
//!
//! Each session owns one connection and one channel. The channel is put in
//! publisher-confirm mode so `publish` only returns once the broker has taken
//! the message, and a small prefetch keeps a stopped consumer from holding
//! more messages than it will ever acknowledge. Messages left unacknowledged
//! when the session closes are requeued by the broker.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    BasicQosOptions, BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use std::collections::HashMap;

use crate::config::BrokerConfig;
use crate::errors::BrokerError;
use crate::model::QueueSpec;
use crate::traits::{Broker, BrokerSession, Delivery};

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT_DELIVERY_MODE: u8 = 2;
const REPLY_SUCCESS: u16 = 200;

/// Connection parameters for an AMQP broker built from broker settings.
///
/// The connection timeout follows `socket_timeout_ms`; lapin handles the
/// encoding of credentials and the virtual host.
pub fn amqp_uri(config: &BrokerConfig) -> AMQPUri {
    AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.virtual_host.clone(),
        query: AMQPQueryString {
            connection_timeout: Some(config.socket_timeout_ms),
            ..AMQPQueryString::default()
        },
        ..AMQPUri::default()
    }
}

/// Connects to a RabbitMQ (or any AMQP 0-9-1) broker.
pub struct AmqpBroker {
    uri: AMQPUri,
    prefetch: u16,
}

impl AmqpBroker {
    pub fn new(uri: AMQPUri, prefetch: u16) -> Self {
        Self { uri, prefetch }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(amqp_uri(config), config.prefetch)
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let connection =
            Connection::connect_uri(self.uri.clone(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;

        Ok(Box::new(AmqpSession {
            connection,
            channel,
            consumers: HashMap::new(),
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "amqp"
    }
}

/// One connection and channel to an AMQP broker.
pub struct AmqpSession {
    connection: Connection,
    channel: Channel,
    /// One consumer per queue, created on the first blocking read.
    consumers: HashMap<String, Consumer>,
    closed: bool,
}

impl AmqpSession {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError::SessionClosed);
        }
        Ok(())
    }

    async fn consumer_for(&mut self, queue: &str) -> Result<&mut Consumer, BrokerError> {
        if !self.consumers.contains_key(queue) {
            let consumer = self
                .channel
                .basic_consume(
                    queue,
                    &format!("fan-in.{}", queue),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await?;
            self.consumers.insert(queue.to_string(), consumer);
        }
        self.consumers
            .get_mut(queue)
            .ok_or_else(|| BrokerError::ConsumerClosed(queue.to_string()))
    }
}

fn to_delivery(queue: &str, delivery: lapin::message::Delivery) -> Delivery {
    Delivery {
        queue: queue.to_string(),
        tag: delivery.delivery_tag,
        payload: delivery.data,
        redelivered: delivery.redelivered,
    }
}

#[async_trait]
impl BrokerSession for AmqpSession {
    async fn declare_queue(&mut self, queue: &QueueSpec) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.channel
            .queue_declare(
                &queue.name,
                QueueDeclareOptions {
                    durable: queue.durable,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish(&mut self, queue: &QueueSpec, payload: &[u8]) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let properties = if queue.persistent_delivery {
            BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE)
        } else {
            BasicProperties::default()
        };

        let confirmation = self
            .channel
            .basic_publish(
                "",
                &queue.name,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(BrokerError::PublishNotConfirmed(queue.name.clone())),
            _ => Ok(()),
        }
    }

    async fn next_delivery(&mut self, queue: &str) -> Result<Delivery, BrokerError> {
        self.ensure_open()?;
        let consumer = self.consumer_for(queue).await?;
        match consumer.next().await {
            Some(Ok(delivery)) => Ok(to_delivery(queue, delivery)),
            Some(Err(err)) => Err(err.into()),
            None => Err(BrokerError::ConsumerClosed(queue.to_string())),
        }
    }

    async fn cancel_consumer(&mut self, queue: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        if let Some(consumer) = self.consumers.remove(queue) {
            self.channel
                .basic_cancel(consumer.tag().as_str(), BasicCancelOptions::default())
                .await?;
        }
        Ok(())
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.channel
            .basic_ack(delivery.tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn reject(&mut self, delivery: &Delivery, requeue: bool) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.channel
            .basic_reject(delivery.tag, BasicRejectOptions { requeue })
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for (_, consumer) in self.consumers.drain() {
            self.channel
                .basic_cancel(consumer.tag().as_str(), BasicCancelOptions::default())
                .await?;
        }
        self.channel.close(REPLY_SUCCESS, "OK").await?;
        self.connection.close(REPLY_SUCCESS, "OK").await?;
        Ok(())
    }
}
