// src/rabbitmq/errors.rs

use serde_json::Error as SerdeError;
use thiserror::Error;
use tokio::time::error::Elapsed;

#[derive(Debug, Error)]
pub enum RabbitMQError {
    #[error("RabbitMQ connection error: {0}")]
    ConnectionError(String),

    #[error("RabbitMQ channel error: {0}")]
    ChannelError(String),

    #[error("Cannot {0} before connect")]
    NotConnected(&'static str),

    #[error("Message serialization error: {0}")]
    SerializationError(#[from] SerdeError),

    #[error("Message encoding error: {0}")]
    EncodingError(String),

    #[error("Message deserialization error: {0}")]
    DeserializationError(String),

    #[error("RabbitMQ queue error: {0}")]
    QueueError(String),

    #[error("RabbitMQ publish error: {0}")]
    PublishError(String),

    #[error("RabbitMQ consume error: {0}")]
    ConsumeError(String),

    #[error("RabbitMQ acknowledge error: {0}")]
    AckError(String),

    #[error("Connection timeout: {0}")]
    TimeoutError(String),

    #[error("RabbitMQ management API error: {0}")]
    ManagementError(#[from] reqwest::Error),

    #[error("Invalid management address: {0}")]
    ManagementAddress(String),

    #[error("Runtime error: {0}")]
    RuntimeError(#[from] std::io::Error),
}

// Custom Result type for RabbitMQ operations
pub type Result<T> = std::result::Result<T, RabbitMQError>;

impl RabbitMQError {
    /// True for failures raised while establishing a session.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RabbitMQError::ConnectionError(_)
                | RabbitMQError::ChannelError(_)
                | RabbitMQError::TimeoutError(_)
        )
    }
}

impl From<Elapsed> for RabbitMQError {
    fn from(_: Elapsed) -> Self {
        RabbitMQError::TimeoutError("Connection timed out".to_string())
    }
}
