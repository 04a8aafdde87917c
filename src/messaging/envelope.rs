//! Transport-agnostic message envelope.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::TransportError;

/// Handle on a peek-locked message, used to complete or abandon it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockToken(Uuid);

impl LockToken {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message travelling over the bus.
///
/// Senders fill in the body and headers; the transport stamps the delivery
/// count, sequence number and (in peek-lock mode) the lock token on receipt.
///
/// ```
/// use bus_composition::messaging::BrokeredMessage;
///
/// let message = BrokeredMessage::from_text(r#"{"id":"o-1"}"#)
///     .with_content_type("application/json")
///     .with_property("event_type", "OrderCreated");
///
/// assert_eq!(message.body_str(), Some(r#"{"id":"o-1"}"#));
/// assert_eq!(message.property("event_type"), Some("OrderCreated"));
/// assert_eq!(message.delivery_count(), 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokeredMessage {
    message_id: String,
    body: Vec<u8>,
    content_type: Option<String>,
    correlation_id: Option<String>,
    properties: BTreeMap<String, String>,
    delivery_count: u32,
    sequence_number: Option<u64>,
    lock_token: Option<LockToken>,
}

impl BrokeredMessage {
    /// Create a message around `body` with a fresh message id.
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            body,
            content_type: None,
            correlation_id: None,
            properties: BTreeMap::new(),
            delivery_count: 0,
            sequence_number: None,
            lock_token: None,
        }
    }

    pub fn from_text(body: impl Into<String>) -> Self {
        Self::new(body.into().into_bytes())
    }

    /// Read exactly `length` bytes from `reader` into a new message.
    ///
    /// Never reads past `length`, so the rest of the stream stays available
    /// to the caller. A stream shorter than `length` is an error.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, length: u64) -> Result<Self, TransportError> {
        let mut body = Vec::with_capacity(length.min(64 * 1024) as usize);
        let mut limited = reader.take(length);
        limited.read_to_end(&mut body)?;

        let actual = body.len() as u64;
        if actual != length {
            return Err(TransportError::PayloadTruncated {
                expected: length,
                actual,
            });
        }
        Ok(Self::new(body))
    }

    /// Create a message with a bitcode-serialized body.
    pub fn encode<T: Serialize>(payload: &T) -> Result<Self, TransportError> {
        let bytes = bitcode::serialize(payload)?;
        Ok(Self::new(bytes).with_content_type("application/x-bitcode"))
    }

    /// Decode a bitcode body.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(bitcode::deserialize(&self.body)?)
    }

    /// Create a message with a JSON body.
    pub fn to_json<T: Serialize>(payload: &T) -> Result<Self, TransportError> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self::new(bytes).with_content_type("application/json"))
    }

    /// Decode a JSON body.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// How many times the message has been handed to a receiver.
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    /// Set for messages received in peek-lock mode.
    pub fn lock_token(&self) -> Option<LockToken> {
        self.lock_token
    }

    pub(crate) fn stamp_sequence(&mut self, sequence_number: u64) {
        self.sequence_number = Some(sequence_number);
    }

    pub(crate) fn stamp_delivery(&mut self, lock_token: Option<LockToken>) {
        self.delivery_count += 1;
        self.lock_token = lock_token;
    }
}
