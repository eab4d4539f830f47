// ============================================
// File: crates/amqptun-transport/src/broker/amqp.rs
// ============================================
//! # AMQP Broker
//!
//! ## Creation Reason
//! Real [`Broker`] implementation on top of lapin (AMQP 0-9-1).
//!
//! ## Setup Sequence
//! 1. Connect to the URI
//! 2. Open one channel
//! 3. Declare the topic exchange (durable)
//! 4. Declare a server-named queue (exclusive, auto-delete)
//!
//! If any step after connecting fails the connection is closed before the
//! error is returned.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The lapin `Channel` is safe to use from the send and receive tasks at
//!   the same time; do not add a lock around publish
//! - Publishes are awaited until the broker has taken the frame; there is
//!   no publisher-confirm mode on the channel
//!
//! ## Last Modified
//! v0.1.0 - Initial lapin implementation

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info, warn};

use super::{Broker, BrokerConfig, Delivery, DeliveryStream};
use crate::error::{Result, TransportError};

/// Reply code for a normal connection close.
const REPLY_SUCCESS: u16 = 200;

/// AMQP session: one connection, one channel, one exclusive queue.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
    exchange: String,
    queue: String,
}

impl AmqpBroker {
    /// Connects and declares the exchange and this node's queue.
    ///
    /// # Errors
    /// - `ConnectFailed`: broker unreachable or refused the login
    /// - `ChannelFailed`: channel could not be opened
    /// - `DeclareFailed`: exchange or queue declaration refused
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        info!("Connecting to AMQP broker");

        let connection = Connection::connect(&config.uri, ConnectionProperties::default())
            .await
            .map_err(TransportError::connect_failed)?;

        match Self::declare(&connection, &config.exchange).await {
            Ok((channel, queue)) => {
                info!("AMQP session ready: exchange={}, queue={}", config.exchange, queue);
                Ok(Self {
                    connection,
                    channel,
                    exchange: config.exchange.clone(),
                    queue,
                })
            }
            Err(e) => {
                if let Err(close_err) = connection.close(REPLY_SUCCESS, "setup failed").await {
                    warn!("Failed to close connection after setup error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn declare(connection: &Connection, exchange: &str) -> Result<(Channel, String)> {
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| TransportError::ChannelFailed {
                reason: e.to_string(),
            })?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::declare_failed("exchange", exchange, e))?;
        debug!("Exchange declared: {}", exchange);

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::declare_failed("queue", "", e))?;
        debug!("Queue declared: {}", queue.name());

        Ok((channel, queue.name().as_str().to_owned()))
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    fn queue_name(&self) -> &str {
        &self.queue
    }

    fn exchange_name(&self) -> &str {
        &self.exchange
    }

    async fn bind(&self, routing_key: &str) -> Result<()> {
        self.channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::bind_failed(&self.exchange, routing_key, e))
    }

    async fn unbind(&self, routing_key: &str) -> Result<()> {
        self.channel
            .queue_unbind(
                &self.queue,
                &self.exchange,
                routing_key,
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::unbind_failed(&self.exchange, routing_key, e))
    }

    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<()> {
        self.channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| TransportError::publish_failed(routing_key, e))?
            .await
            .map_err(|e| TransportError::publish_failed(routing_key, e))?;

        Ok(())
    }

    async fn consume(&self) -> Result<DeliveryStream> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| TransportError::consume_failed(&self.queue, e))?;
        debug!("Consumer registered on {}", self.queue);

        let queue = self.queue.clone();
        let stream = consumer.map(move |delivery| {
            delivery
                .map(|d| Delivery {
                    routing_key: d.routing_key.as_str().to_owned(),
                    body: Bytes::from(d.data),
                })
                .map_err(|e| TransportError::consume_failed(&queue, e))
        });

        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<()> {
        info!("Closing AMQP connection");
        self.connection
            .close(REPLY_SUCCESS, "shutdown")
            .await
            .map_err(|e| TransportError::ConnectFailed {
                reason: format!("close failed: {e}"),
            })
    }
}

impl std::fmt::Debug for AmqpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBroker")
            .field("exchange", &self.exchange)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
