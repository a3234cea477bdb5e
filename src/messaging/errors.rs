//! # Messaging Error Types
//!
//! Structured error types for backend transport, envelope construction and
//! payload decoding, built on thiserror instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// Errors raised by backends and by the message envelope itself
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Fetch failed on topic {topic}: {message}")]
    Fetch { topic: String, message: String },

    #[error("Push failed on topic {topic}: {message}")]
    Push { topic: String, message: String },

    #[error("Queue closed: {topic}")]
    QueueClosed { topic: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Payload decode error for message {message_id}: {message}")]
    PayloadDecode { message_id: String, message: String },

    #[error("Invalid message schedule: {reason}")]
    InvalidSchedule { reason: String },
}

impl MessagingError {
    /// Create a fetch (transport) error
    pub fn fetch(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a push (transport) error
    pub fn push(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Push {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a queue closed error
    pub fn queue_closed(topic: impl Into<String>) -> Self {
        Self::QueueClosed {
            topic: topic.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a message deserialization error
    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    /// Create a payload decode error
    pub fn payload_decode(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadDecode {
            message_id: message_id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid schedule error
    pub fn invalid_schedule(reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            reason: reason.into(),
        }
    }

    /// Whether the error came from the backend transport rather than the envelope
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Push { .. } | Self::QueueClosed { .. }
        )
    }
}

/// Conversion from serde_json::Error to MessagingError
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            MessagingError::message_deserialization(err.to_string())
        } else {
            MessagingError::message_serialization(err.to_string())
        }
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messaging_error_creation() {
        let fetch_err = MessagingError::fetch("orders", "connection reset");
        assert!(matches!(fetch_err, MessagingError::Fetch { .. }));
        assert!(fetch_err.is_transport());

        let schedule_err = MessagingError::invalid_schedule("expire before delay");
        assert!(matches!(schedule_err, MessagingError::InvalidSchedule { .. }));
        assert!(!schedule_err.is_transport());
    }

    #[test]
    fn test_error_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json").unwrap_err();
        let messaging_err: MessagingError = json_err.into();
        assert!(matches!(
            messaging_err,
            MessagingError::MessageDeserialization { .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let push_err = MessagingError::push("notify:email", "broker unavailable");
        let display_str = format!("{push_err}");
        assert!(display_str.contains("Push failed"));
        assert!(display_str.contains("notify:email"));
        assert!(display_str.contains("broker unavailable"));
    }
}
