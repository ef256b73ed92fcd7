//! Thin RabbitMQ SDK with two facades over `lapin`.
//!
//! [`RabbitMQ`] blocks the calling thread; [`AioRabbitMQ`] runs on a tokio
//! runtime. Both connect with host, port and credentials, publish a
//! [`MessagePayload`] to a named queue on the default exchange, and hand
//! received messages to a callback as a [`Delivery`]. Queues are declared
//! implicitly by `send` and `receive`.
//!
//! ```no_run
//! use rabbitmq_sdk::{MessagePayload, QueueOptions, RabbitMQ, Result};
//!
//! struct Note(String);
//!
//! impl MessagePayload for Note {
//!     fn serialize(&self) -> Result<String> {
//!         Ok(self.0.clone())
//!     }
//!
//!     fn deserialize(message: &str) -> Result<Self> {
//!         Ok(Note(message.to_string()))
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let mut conn = RabbitMQ::new(QueueOptions::default());
//!     conn.connect("localhost", 5672, "guest", "guest")?;
//!     conn.send("test", &Note("hello".to_string()))?;
//!     conn.disconnect()
//! }
//! ```

pub mod config;
pub mod env;
pub mod payload;
pub mod rabbitmq;

pub use config::{ConnectionConfig, ManagementConfig, QueueOptions, RabbitConfig};
pub use payload::MessagePayload;
pub use rabbitmq::{AioRabbitMQ, Delivery, DeliveryMetadata, RabbitMQ, RabbitMQError, Result};
