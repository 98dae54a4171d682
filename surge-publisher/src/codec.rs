//! Wire encoding for produced records.
//!
//! Keys are the message id and values are the JSON text of the whole message. Both are
//! base64-encoded with the standard alphabet before they reach the broker client.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use surge_core::{Error, Message, Result};

/// A key/value pair as handed to a [`BrokerClient`](crate::client::BrokerClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Base64 of the message id
    pub key: Bytes,
    /// Base64 of the message JSON
    pub value: Bytes,
    /// Length of the message JSON before encoding, as counted by the throughput metric
    pub message_len: usize,
}

/// Encode a message into a wire record.
///
/// # Errors
/// Returns an error if the message cannot be serialized.
pub fn encode_message(message: &Message) -> Result<Record> {
    let json = message.to_json()?;
    Ok(Record {
        key: Bytes::from(STANDARD.encode(message.message_id.as_str())),
        value: Bytes::from(STANDARD.encode(&json)),
        message_len: json.len(),
    })
}

/// Decode a wire record back into the message it carries.
///
/// # Errors
/// Returns an error if the value is not base64 or not a message.
pub fn decode_record(record: &Record) -> Result<Message> {
    let raw = STANDARD.decode(&record.value).map_err(|e| Error::Serialization {
        message: format!("record value is not base64: {e}"),
    })?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Decode the key of a record into the message id text.
///
/// # Errors
/// Returns an error if the key is not base64-encoded UTF-8.
pub fn decode_key(record: &Record) -> Result<String> {
    let raw = STANDARD.decode(&record.key).map_err(|e| Error::Serialization {
        message: format!("record key is not base64: {e}"),
    })?;
    String::from_utf8(raw).map_err(|e| Error::Serialization { message: e.to_string() })
}
