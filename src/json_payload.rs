// src/json_payload.rs
use std::io;

use rabbitmq_sdk::{MessagePayload, RabbitMQError, Result};
use serde_json::ser::Formatter;

/// Demo payload carried as a JSON object.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JsonPayload {
    pub firstname: String,
    pub lastname: String,
}

impl JsonPayload {
    pub fn new(firstname: &str, lastname: &str) -> Self {
        Self {
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
        }
    }
}

// Compact JSON with a space after `,` and `:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

impl MessagePayload for JsonPayload {
    fn serialize(&self) -> Result<String> {
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        serde::Serialize::serialize(self, &mut serializer)?;
        String::from_utf8(buf).map_err(|e| RabbitMQError::EncodingError(e.to_string()))
    }

    fn deserialize(message: &str) -> Result<Self> {
        serde_json::from_str(message).map_err(|e| RabbitMQError::DeserializationError(e.to_string()))
    }
}
