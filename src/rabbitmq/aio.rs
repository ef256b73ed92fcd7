// src/rabbitmq/aio.rs
//! Event-loop-driven facade on tokio.

use std::future::Future;

use futures_lite::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

use crate::config::{ConnectionConfig, ManagementConfig, QueueOptions};
use crate::payload::MessagePayload;
use super::connection::Session;
use super::delivery::Delivery;
use super::errors::{RabbitMQError, Result};
use super::management;

/// Asynchronous RabbitMQ connection: connect, send, receive, disconnect.
///
/// Receive callbacks run as tasks on the runtime given to
/// [`AioRabbitMQ::with_handle`], or on the runtime `receive` is awaited on.
pub struct AioRabbitMQ {
    options: QueueOptions,
    handle: Option<Handle>,
    session: Option<Session>,
    consumers: Vec<AbortHandle>,
}

impl AioRabbitMQ {
    pub fn new(options: QueueOptions) -> Self {
        Self {
            options,
            handle: None,
            session: None,
            consumers: Vec::new(),
        }
    }

    /// Bind consumer tasks to a specific runtime.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub async fn connect(&mut self, host: &str, port: u16, username: &str, password: &str) -> Result<()> {
        self.connect_with(&ConnectionConfig::new(host, port, username, password)).await
    }

    /// Open a connection and channel, replacing any previous session.
    pub async fn connect_with(&mut self, config: &ConnectionConfig) -> Result<()> {
        self.disconnect().await?;
        self.session = Some(Session::open(config).await?);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().map_or(false, Session::is_connected)
    }

    fn connected(&mut self, operation: &'static str) -> Result<&mut Session> {
        self.session.as_mut().ok_or(RabbitMQError::NotConnected(operation))
    }

    /// Make sure `queue` exists and publish the serialized payload to it.
    pub async fn send<P: MessagePayload>(&mut self, queue: &str, payload: &P) -> Result<()> {
        let options = self.options;
        let session = self.connected("send")?;
        let body = payload.serialize()?;

        session.ensure_queue(queue, &options).await?;
        session.publish(queue, body.as_bytes(), &options).await
    }

    /// Make sure `queue` exists and start a consumer task that awaits
    /// `callback` once per delivery, in broker order.
    ///
    /// Returns once the consumer is registered. The returned handle resolves
    /// to `Ok(())` when the broker ends the consumer stream and to
    /// [`RabbitMQError::ConsumeError`] when the stream fails. It is cancelled
    /// by [`AioRabbitMQ::disconnect`]. Dropping it leaves the task running.
    pub async fn receive<F, Fut>(&mut self, queue: &str, callback: F) -> Result<JoinHandle<Result<()>>>
    where
        F: Fn(Delivery) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => Handle::try_current()
                .map_err(|e| RabbitMQError::ConsumeError(format!("No tokio runtime for consumer: {}", e)))?,
        };
        let options = self.options;
        let session = self.connected("receive")?;

        session.ensure_queue(queue, &options).await?;
        let consumer = session.consume(queue, &options).await?;
        let channel_id = session.channel().id();

        let task = handle.spawn(drive_consumer(consumer, channel_id, queue.to_string(), callback));
        self.track_consumer(task.abort_handle());
        Ok(task)
    }

    fn track_consumer(&mut self, task: AbortHandle) {
        self.consumers.retain(|t| !t.is_finished());
        self.consumers.push(task);
    }

    /// Acknowledge a delivery by hand when `auto_ack` is off.
    pub async fn commit_ack(&mut self, delivery: &Delivery) -> Result<()> {
        self.connected("acknowledge")?;
        delivery.ack().await
    }

    pub async fn delete_queue(&mut self, queue: &str) -> Result<u32> {
        self.connected("delete a queue")?.delete_queue(queue).await
    }

    /// Queue names known to the broker's management API.
    pub async fn get_list_queues(&self, management: &ManagementConfig) -> Result<Vec<String>> {
        management::list_queues(management).await
    }

    /// Stop consumer tasks and close the channel and connection. Safe to
    /// call when not connected.
    pub async fn disconnect(&mut self) -> Result<()> {
        for task in self.consumers.drain(..) {
            task.abort();
        }

        match self.session.take() {
            Some(session) => {
                session.close().await?;
                info!("Disconnected from RabbitMQ");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Feed each delivery to `callback`, one at a time, until the stream ends.
async fn drive_consumer<S, F, Fut>(mut stream: S, channel_id: u16, queue: String, callback: F) -> Result<()>
where
    S: Stream<Item = lapin::Result<lapin::message::Delivery>> + Unpin,
    F: Fn(Delivery) -> Fut,
    Fut: Future<Output = ()>,
{
    while let Some(delivery) = stream.next().await {
        match delivery {
            Ok(delivery) => callback(Delivery::new(channel_id, delivery)).await,
            Err(e) => {
                return Err(RabbitMQError::ConsumeError(format!(
                    "Error receiving message from '{}': {}",
                    queue, e
                )));
            }
        }
    }
    debug!(queue = %queue, "Consumer stream ended");
    Ok(())
}

impl Default for AioRabbitMQ {
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

impl Drop for AioRabbitMQ {
    fn drop(&mut self) {
        for task in self.consumers.drain(..) {
            task.abort();
        }
    }
}
