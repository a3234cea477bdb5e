//! # Lifecycle Listeners
//!
//! Optional observers invoked around produce and consume transitions. Every hook
//! receives the topic, the message when one exists, and the error when one
//! occurred. All hooks default to no-ops so implementors only override what
//! they care about.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::errors::MessagingError;
use super::message::Message;

/// Hooks around [`crate::producer::ProducerCore::send`]
#[async_trait]
pub trait ProducerListener: Send + Sync + 'static {
    /// Called before the message is pushed
    async fn prepare_send(&self, _topic: &str, _message: &Message, _error: Option<&MessagingError>) {}

    /// Called after the backend accepted the message
    async fn on_send_succeed(&self, _topic: &str, _message: &Message) {}

    /// Called when the push failed. The error is also returned to the caller.
    async fn on_send_fail(&self, _topic: &str, _message: &Message, _error: &MessagingError) {}
}

/// Hooks around fetching and handling on the consume path
#[async_trait]
pub trait ConsumeListener: Send + Sync + 'static {
    /// Called after each fetch attempt (`message` is `None` when it failed) and
    /// again right before the handler runs
    async fn prepare_consume(
        &self,
        _topic: &str,
        _message: Option<&Message>,
        _error: Option<&MessagingError>,
    ) {
    }

    /// Called after the handler returned `Ok`
    async fn on_consume_succeed(&self, _topic: &str, _message: &Message) {}

    /// Called after the handler returned an error
    async fn on_consume_fail(&self, _topic: &str, _message: &Message, _error: &anyhow::Error) {}
}

/// Listener that records every hook as a tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

#[async_trait]
impl ProducerListener for TracingListener {
    async fn prepare_send(&self, topic: &str, message: &Message, error: Option<&MessagingError>) {
        match error {
            Some(error) => warn!(topic = %topic, message_id = %message.id(), error = %error, "prepare_send with error"),
            None => debug!(topic = %topic, message_id = %message.id(), "prepare_send"),
        }
    }

    async fn on_send_succeed(&self, topic: &str, message: &Message) {
        debug!(topic = %topic, message_id = %message.id(), "📤 message sent");
    }

    async fn on_send_fail(&self, topic: &str, message: &Message, error: &MessagingError) {
        warn!(topic = %topic, message_id = %message.id(), error = %error, "❌ message send failed");
    }
}

#[async_trait]
impl ConsumeListener for TracingListener {
    async fn prepare_consume(
        &self,
        topic: &str,
        message: Option<&Message>,
        error: Option<&MessagingError>,
    ) {
        match (message, error) {
            (_, Some(error)) => warn!(topic = %topic, error = %error, "fetch failed"),
            (Some(message), None) => debug!(topic = %topic, message_id = %message.id(), "prepare_consume"),
            (None, None) => debug!(topic = %topic, "prepare_consume"),
        }
    }

    async fn on_consume_succeed(&self, topic: &str, message: &Message) {
        debug!(topic = %topic, message_id = %message.id(), "✅ message handled");
    }

    async fn on_consume_fail(&self, topic: &str, message: &Message, error: &anyhow::Error) {
        warn!(topic = %topic, message_id = %message.id(), error = %error, "❌ handler failed");
    }
}
