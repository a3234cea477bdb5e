//! # Message Envelope
//!
//! The unit that flows through producers, backends and the consumption pipeline.
//!
//! The payload is kept as an opaque, already-serialized JSON blob. Nothing in the
//! core reparses it, so numbers keep their exact textual precision across a
//! backend round trip. Handler code and pipeline transforms read it back with an
//! explicit [`Message::decode`] call into the shape they expect.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::errors::{MessagingError, MessagingResult};

/// Message envelope carried through the whole system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique id, empty until assigned at production time
    #[serde(default)]
    id: String,
    /// Serialized payload
    data: Box<RawValue>,
    /// Earliest time the message is meant to be processed at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay_at: Option<DateTime<Utc>>,
    /// Time after which the message is considered stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expire_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Wrap any serializable value in a new, unscheduled message
    pub fn new<T: Serialize + ?Sized>(data: &T) -> MessagingResult<Self> {
        let raw = serde_json::value::to_raw_value(data)
            .map_err(|e| MessagingError::message_serialization(e.to_string()))?;
        Ok(Self::from_raw(raw))
    }

    /// Wrap an already-serialized payload
    pub fn from_raw(data: Box<RawValue>) -> Self {
        Self {
            id: String::new(),
            data,
            delay_at: None,
            expire_at: None,
        }
    }

    /// Start building a scheduled message
    pub fn builder<T: Serialize + ?Sized>(data: &T) -> MessageBuilder {
        MessageBuilder {
            data: serde_json::value::to_raw_value(data)
                .map_err(|e| MessagingError::message_serialization(e.to_string())),
            delay_at: None,
            expire_at: None,
        }
    }

    /// Carry an explicit id, e.g. when a compress transform keeps the id of the
    /// first message it merged
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Raw serialized payload
    pub fn data(&self) -> &RawValue {
        &self.data
    }

    pub fn delay_at(&self) -> Option<DateTime<Utc>> {
        self.delay_at
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    /// Decode the payload into a caller-chosen type
    pub fn decode<T: DeserializeOwned>(&self) -> MessagingResult<T> {
        serde_json::from_str(self.data.get())
            .map_err(|e| MessagingError::payload_decode(self.id.clone(), e.to_string()))
    }

    /// Whether `expire_at` has passed. Advisory: the pipeline only acts on it
    /// when the consumer is configured to drop expired messages.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|expire_at| expire_at <= now)
    }

    /// Encode to the JSON wire form used by backends
    pub fn to_bytes(&self) -> MessagingResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    /// Decode from the JSON wire form used by backends
    pub fn from_bytes(bytes: &[u8]) -> MessagingResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.data.get() == other.data.get()
            && self.delay_at == other.delay_at
            && self.expire_at == other.expire_at
    }
}

/// Builder for messages carrying `delay_at` / `expire_at`
///
/// Schedule ordering is checked in [`MessageBuilder::build`], so a bad schedule
/// never produces a message.
#[derive(Debug)]
pub struct MessageBuilder {
    data: MessagingResult<Box<RawValue>>,
    delay_at: Option<DateTime<Utc>>,
    expire_at: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    pub fn delay_at(mut self, delay_at: DateTime<Utc>) -> Self {
        self.delay_at = Some(delay_at);
        self
    }

    pub fn expire_at(mut self, expire_at: DateTime<Utc>) -> Self {
        self.expire_at = Some(expire_at);
        self
    }

    /// Validate against the current time and build
    pub fn build(self) -> MessagingResult<Message> {
        self.build_at(Utc::now())
    }

    /// Validate against an explicit creation time and build
    pub fn build_at(self, now: DateTime<Utc>) -> MessagingResult<Message> {
        let data = self.data?;

        if let Some(delay_at) = self.delay_at {
            if delay_at <= now {
                return Err(MessagingError::invalid_schedule(
                    "delay_at must be later than creation time",
                ));
            }
        }

        if let Some(expire_at) = self.expire_at {
            if expire_at <= now {
                return Err(MessagingError::invalid_schedule(
                    "expire_at must be later than creation time",
                ));
            }
            if let Some(delay_at) = self.delay_at {
                if expire_at <= delay_at {
                    return Err(MessagingError::invalid_schedule(
                        "expire_at must be later than delay_at",
                    ));
                }
            }
        }

        Ok(Message {
            id: String::new(),
            data,
            delay_at: self.delay_at,
            expire_at: self.expire_at,
        })
    }
}
