// src/rabbitmq/delivery.rs
use std::fmt;

use lapin::{
    acker::Acker,
    options::{BasicAckOptions, BasicNackOptions, BasicRejectOptions},
    BasicProperties,
};

use crate::payload::MessagePayload;
use super::errors::{RabbitMQError, Result};

/// Routing details the broker attached to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMetadata {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
}

/// A received message, handed to receive callbacks by both facades.
pub struct Delivery {
    /// Channel the message arrived on.
    pub channel_id: u16,
    pub metadata: DeliveryMetadata,
    pub properties: BasicProperties,
    /// Raw message body, exactly as published.
    pub body: Vec<u8>,
    acker: Acker,
}

impl Delivery {
    pub(crate) fn new(channel_id: u16, delivery: lapin::message::Delivery) -> Self {
        Self {
            channel_id,
            metadata: DeliveryMetadata {
                delivery_tag: delivery.delivery_tag,
                exchange: delivery.exchange.as_str().to_owned(),
                routing_key: delivery.routing_key.as_str().to_owned(),
                redelivered: delivery.redelivered,
            },
            properties: delivery.properties,
            body: delivery.data,
            acker: delivery.acker,
        }
    }

    pub fn body_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| RabbitMQError::DeserializationError(format!("Body is not UTF-8: {}", e)))
    }

    /// Rebuild the caller's payload type from the body.
    pub fn payload<P: MessagePayload>(&self) -> Result<P> {
        P::from_bytes(&self.body)
    }

    /// Manual acknowledgement, for consumers running without auto-ack.
    pub async fn ack(&self) -> Result<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| self.ack_error("ack", e))
    }

    pub async fn nack(&self, requeue: bool) -> Result<()> {
        self.acker
            .nack(BasicNackOptions { requeue, ..BasicNackOptions::default() })
            .await
            .map(|_| ())
            .map_err(|e| self.ack_error("nack", e))
    }

    pub async fn reject(&self, requeue: bool) -> Result<()> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(|e| self.ack_error("reject", e))
    }

    fn ack_error(&self, action: &str, error: lapin::Error) -> RabbitMQError {
        RabbitMQError::AckError(format!(
            "Failed to {} delivery {}: {}",
            action, self.metadata.delivery_tag, error
        ))
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("channel_id", &self.channel_id)
            .field("metadata", &self.metadata)
            .field("properties", &self.properties)
            .field("body_len", &self.body.len())
            .finish()
    }
}
