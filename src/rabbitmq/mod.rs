// src/rabbitmq/mod.rs
// RabbitMQ facades over lapin

pub mod errors;
pub mod management;

mod aio;
mod blocking;
mod connection;
mod delivery;

// Re-export specific items to simplify imports elsewhere
pub use aio::AioRabbitMQ;
pub use blocking::RabbitMQ;
pub use delivery::{Delivery, DeliveryMetadata};
pub use errors::{RabbitMQError, Result};
