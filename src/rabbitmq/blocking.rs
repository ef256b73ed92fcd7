// src/rabbitmq/blocking.rs
//! Thread-blocking facade.
//!
//! Each connection owns a private current-thread tokio runtime and blocks on
//! it for every broker call, so a `RabbitMQ` must not be used from inside an
//! async context.

use std::cell::Cell;

use futures_lite::StreamExt;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, QueueOptions};
use crate::payload::MessagePayload;
use super::connection::Session;
use super::delivery::Delivery;
use super::errors::{RabbitMQError, Result};

struct Blocking {
    runtime: Runtime,
    session: Session,
}

/// Blocking RabbitMQ connection: connect, send, receive, disconnect.
///
/// The handle has a single owner. It can be moved to another thread but not
/// shared between threads.
pub struct RabbitMQ {
    options: QueueOptions,
    state: Option<Blocking>,
    stop_requested: Cell<bool>,
}

impl RabbitMQ {
    pub fn new(options: QueueOptions) -> Self {
        Self {
            options,
            state: None,
            stop_requested: Cell::new(false),
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn connect(&mut self, host: &str, port: u16, username: &str, password: &str) -> Result<()> {
        self.connect_with(&ConnectionConfig::new(host, port, username, password))
    }

    /// Open a connection and channel, replacing any previous session.
    pub fn connect_with(&mut self, config: &ConnectionConfig) -> Result<()> {
        self.disconnect()?;

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let session = runtime.block_on(Session::open(config))?;
        self.state = Some(Blocking { runtime, session });
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state.as_ref().map_or(false, |state| state.session.is_connected())
    }

    fn connected(&self, operation: &'static str) -> Result<&Blocking> {
        self.state.as_ref().ok_or(RabbitMQError::NotConnected(operation))
    }

    /// Declare `queue` if needed and publish the serialized payload to it.
    pub fn send<P: MessagePayload>(&self, queue: &str, payload: &P) -> Result<()> {
        let state = self.connected("send")?;
        let body = payload.serialize()?;

        state.runtime.block_on(async {
            state.session.declare_queue(queue, &self.options).await?;
            state.session.publish(queue, body.as_bytes(), &self.options).await
        })
    }

    /// Declare `queue` if needed, then block the calling thread and hand every
    /// delivery to `callback` in broker order.
    ///
    /// Returns when the consumer is cancelled by the broker, the connection
    /// drops, or the callback calls [`RabbitMQ::stop_consuming`].
    pub fn receive<F>(&self, queue: &str, mut callback: F) -> Result<()>
    where
        F: FnMut(Delivery),
    {
        let state = self.connected("receive")?;
        let channel_id = state.session.channel().id();
        self.stop_requested.set(false);

        let mut consumer = state.runtime.block_on(async {
            state.session.declare_queue(queue, &self.options).await?;
            if let Some(prefetch) = self.options.consumer_prefetch() {
                state.session.set_prefetch(prefetch).await?;
            }
            state.session.consume(queue, &self.options).await
        })?;
        let consumer_tag = consumer.tag().as_str().to_owned();

        info!(queue = %queue, "Waiting for messages");
        while !self.stop_requested.get() {
            match state.runtime.block_on(consumer.next()) {
                Some(Ok(delivery)) => callback(Delivery::new(channel_id, delivery)),
                Some(Err(e)) => {
                    return Err(RabbitMQError::ConsumeError(format!("Error receiving message: {}", e)));
                }
                None => {
                    warn!(queue = %queue, "Consumer stream ended");
                    return Ok(());
                }
            }
        }

        debug!(consumer_tag = %consumer_tag, "Stop requested, cancelling consumer");
        state.runtime.block_on(state.session.cancel(&consumer_tag))
    }

    /// Ask a running [`RabbitMQ::receive`] loop to return after the current
    /// callback. Meant to be called from inside the callback.
    ///
    /// With `auto_ack` on, the broker pushes and acknowledges queued messages
    /// ahead of the callback, so messages buffered but not yet handed out are
    /// lost when the consumer stops. With `auto_ack` off the consumer holds
    /// one unacknowledged message at a time, and anything unacknowledged is
    /// requeued when the channel closes.
    pub fn stop_consuming(&self) {
        self.stop_requested.set(true);
    }

    /// Acknowledge a delivery by hand when `auto_ack` is off.
    pub fn commit_ack(&self, delivery: &Delivery) -> Result<()> {
        let state = self.connected("acknowledge")?;
        state.runtime.block_on(delivery.ack())
    }

    pub fn delete_queue(&self, queue: &str) -> Result<u32> {
        let state = self.connected("delete a queue")?;
        state.runtime.block_on(state.session.delete_queue(queue))
    }

    /// Close the channel and connection. Safe to call when not connected.
    pub fn disconnect(&mut self) -> Result<()> {
        match self.state.take() {
            Some(Blocking { runtime, session }) => runtime.block_on(session.close()),
            None => Ok(()),
        }
    }
}

impl Default for RabbitMQ {
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

impl Drop for RabbitMQ {
    fn drop(&mut self) {
        if self.state.is_some() {
            if let Err(e) = self.disconnect() {
                warn!("Failed to close RabbitMQ connection on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Text(String);

    impl MessagePayload for Text {
        fn serialize(&self) -> Result<String> {
            Ok(self.0.clone())
        }

        fn deserialize(message: &str) -> Result<Self> {
            Ok(Text(message.to_string()))
        }
    }

    #[test]
    fn test_send_before_connect_is_an_operation_error() {
        let conn = RabbitMQ::default();
        let err = conn.send("test", &Text("hello".into())).unwrap_err();
        assert!(matches!(err, RabbitMQError::NotConnected("send")));
    }

    #[test]
    fn test_receive_before_connect_never_calls_back() {
        let conn = RabbitMQ::default();
        let mut calls = 0;
        let err = conn.receive("test", |_| calls += 1).unwrap_err();
        assert!(matches!(err, RabbitMQError::NotConnected("receive")));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_delete_queue_before_connect() {
        let conn = RabbitMQ::default();
        assert!(matches!(conn.delete_queue("test"), Err(RabbitMQError::NotConnected(_))));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut conn = RabbitMQ::default();
        assert!(conn.disconnect().is_ok());
        assert!(conn.disconnect().is_ok());
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_unreachable_broker_leaves_no_session() {
        let mut conn = RabbitMQ::default();
        let config = ConnectionConfig {
            connection_timeout_ms: 2000,
            ..ConnectionConfig::new("127.0.0.1", 1, "guest", "guest")
        };

        let err = conn.connect_with(&config).unwrap_err();
        assert!(err.is_connection_error(), "unexpected error: {}", err);
        assert!(!conn.is_connected());
        assert!(matches!(
            conn.send("test", &Text("hello".into())),
            Err(RabbitMQError::NotConnected(_))
        ));
    }

    #[test]
    fn test_options_are_kept() {
        let options = QueueOptions { durable: true, auto_ack: false, auto_delete: true };
        let conn = RabbitMQ::new(options);
        assert_eq!(conn.options(), &options);
    }
}
