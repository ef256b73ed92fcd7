// src/rabbitmq/connection.rs
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Consumer, Queue,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConnectionConfig, QueueOptions};
use super::errors::{RabbitMQError, Result};

const REPLY_SUCCESS: u16 = 200;

/// One live connection with its single channel. Both facades drive the
/// broker through this; they only differ in how they wait on it.
pub(crate) struct Session {
    connection: Connection,
    channel: Channel,
}

impl Session {
    /// Connect and open a channel. Nothing is kept if either step fails.
    pub(crate) async fn open(config: &ConnectionConfig) -> Result<Self> {
        let address = config.redacted_address();
        info!("Connecting to RabbitMQ at {}", address);

        let connection = timeout(
            config.connect_timeout(),
            Connection::connect_uri(config.amqp_uri(), ConnectionProperties::default()),
        )
        .await?
        .map_err(|e| RabbitMQError::ConnectionError(format!("Failed to connect to {}: {}", address, e)))?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.close(REPLY_SUCCESS, "Channel open failed").await {
                    warn!("Failed to close connection after channel error: {}", close_err);
                }
                return Err(RabbitMQError::ChannelError(format!("Failed to create channel: {}", e)));
            }
        };

        debug!(channel_id = channel.id(), "Connected to RabbitMQ at {}", address);
        Ok(Self { connection, channel })
    }

    pub(crate) fn channel(&self) -> &Channel {
        &self.channel
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    /// Plain, idempotent declaration with the facade's flags.
    pub(crate) async fn declare_queue(&self, queue: &str, options: &QueueOptions) -> Result<Queue> {
        let declared = self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: options.durable,
                    auto_delete: options.auto_delete,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| RabbitMQError::QueueError(format!("Failed to declare queue '{}': {}", queue, e)))?;

        debug!(queue = %queue, messages = declared.message_count(), "Queue declared");
        Ok(declared)
    }

    /// Use the queue as it exists, or declare it when it does not.
    ///
    /// A failed passive declaration closes the channel it ran on, so the
    /// check uses a throwaway channel. The session channel, with its
    /// consumers and ackers, is never touched by a missing queue.
    pub(crate) async fn ensure_queue(&self, queue: &str, options: &QueueOptions) -> Result<Queue> {
        let check = self
            .connection
            .create_channel()
            .await
            .map_err(|e| RabbitMQError::ChannelError(format!("Failed to open channel for queue check: {}", e)))?;
        let passive = QueueDeclareOptions {
            passive: true,
            ..QueueDeclareOptions::default()
        };

        match check.queue_declare(queue, passive, FieldTable::default()).await {
            Ok(existing) => {
                if let Err(e) = check.close(REPLY_SUCCESS, "Queue check done").await {
                    debug!(queue = %queue, "Failed to close queue check channel: {}", e);
                }
                Ok(existing)
            }
            Err(e) => {
                debug!(queue = %queue, "Queue not found ({}), declaring it", e);
                self.declare_queue(queue, options).await
            }
        }
    }

    /// Limit unacknowledged deliveries held by this channel's consumers.
    pub(crate) async fn set_prefetch(&self, count: u16) -> Result<()> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| RabbitMQError::ChannelError(format!("Failed to set QoS: {}", e)))?;

        debug!(channel_id = self.channel.id(), prefetch = count, "Channel QoS set");
        Ok(())
    }

    /// Publish on the default exchange, routed by queue name. The publish is
    /// written to the transport; no broker confirmation is awaited.
    pub(crate) async fn publish(&self, queue: &str, body: &[u8], options: &QueueOptions) -> Result<()> {
        let properties = match options.delivery_mode() {
            Some(mode) => BasicProperties::default().with_delivery_mode(mode),
            None => BasicProperties::default(),
        };

        self.channel
            .basic_publish("", queue, BasicPublishOptions::default(), body, properties)
            .await
            .map_err(|e| RabbitMQError::PublishError(format!("Failed to publish to '{}': {}", queue, e)))?;

        debug!(queue = %queue, bytes = body.len(), "Published message");
        Ok(())
    }

    pub(crate) async fn consume(&self, queue: &str, options: &QueueOptions) -> Result<Consumer> {
        let consumer_tag = format!("consumer-{}", Uuid::new_v4());
        let consumer = self
            .channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: options.auto_ack,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| RabbitMQError::ConsumeError(format!("Failed to consume from '{}': {}", queue, e)))?;

        info!(consumer_tag = %consumer_tag, auto_ack = options.auto_ack, "Started consuming from queue: {}", queue);
        Ok(consumer)
    }

    pub(crate) async fn cancel(&self, consumer_tag: &str) -> Result<()> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| RabbitMQError::ConsumeError(format!("Failed to cancel consumer '{}': {}", consumer_tag, e)))
    }

    /// Returns the number of messages dropped with the queue.
    pub(crate) async fn delete_queue(&self, queue: &str) -> Result<u32> {
        let purged = self
            .channel
            .queue_delete(queue, QueueDeleteOptions::default())
            .await
            .map_err(|e| RabbitMQError::QueueError(format!("Failed to delete queue '{}': {}", queue, e)))?;

        info!(queue = %queue, purged, "Queue deleted");
        Ok(purged)
    }

    /// Close the channel, then the connection.
    pub(crate) async fn close(self) -> Result<()> {
        info!("Closing RabbitMQ connection gracefully");

        if self.channel.status().connected() {
            self.channel
                .close(REPLY_SUCCESS, "Closing channel")
                .await
                .map_err(|e| RabbitMQError::ChannelError(format!("Failed to close channel: {}", e)))?;
        }

        if self.connection.status().connected() {
            self.connection
                .close(REPLY_SUCCESS, "Closing connection")
                .await
                .map_err(|e| RabbitMQError::ConnectionError(format!("Failed to close connection: {}", e)))?;
        }
        Ok(())
    }
}
