// src/payload.rs
//! The message payload contract.
//!
//! The SDK ships no codec. Callers pick a wire format by implementing
//! [`MessagePayload`] for their own types; the facades only ever move the
//! resulting string around.

use crate::rabbitmq::{RabbitMQError, Result};

/// Caller-defined message content with a string round trip.
///
/// Implementations must accept exactly what their own `serialize` produces:
/// `P::deserialize(&p.serialize()?)` has to rebuild an equivalent value.
/// The SDK relies on this but never checks it.
pub trait MessagePayload: Sized {
    /// Convert this value to the string sent as the message body.
    /// Failures that are not serde errors belong in
    /// [`RabbitMQError::EncodingError`].
    fn serialize(&self) -> Result<String>;

    /// Rebuild a value from a received message body.
    fn deserialize(message: &str) -> Result<Self>;

    /// Rebuild a value from a raw delivery body.
    fn from_bytes(body: &[u8]) -> Result<Self> {
        let message = std::str::from_utf8(body)
            .map_err(|e| RabbitMQError::DeserializationError(format!("Body is not UTF-8: {}", e)))?;
        Self::deserialize(message)
    }
}
