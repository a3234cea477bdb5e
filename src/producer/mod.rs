//! # Producer Core
//!
//! Assigns an id to every outgoing message, wraps the push in the producer
//! listener hooks and delegates to a [`Pushable`] backend. Exactly one push
//! attempt is made per send; failures go back to the caller untouched.
//!
//! ```rust
//! use conduit_core::messaging::{Fetchable, InMemoryBroker};
//! use conduit_core::producer::ProducerCore;
//!
//! # tokio_test::block_on(async {
//! let broker = InMemoryBroker::new("notify:sms");
//! let producer = ProducerCore::builder("notify:sms").build().unwrap();
//!
//! let id = producer.send_data(&broker, &"hello").await.unwrap();
//! let fetched = broker.fetch().await.unwrap();
//! assert_eq!(fetched.id(), id);
//! # });
//! ```

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::{ConduitConfig, ConfigurationError};
use crate::messaging::{
    IdGenerator, Message, MessagingError, ProducerListener, Pushable, UuidV7Generator,
};

#[derive(Debug, Error)]
pub enum ProducerError {
    /// The backend rejected the message. Carries the id that was assigned.
    #[error("Push of message {message_id} failed: {source}")]
    PushFailed {
        message_id: String,
        #[source]
        source: MessagingError,
    },

    #[error("Id generator returned an empty id")]
    EmptyMessageId,

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("Invalid producer configuration: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl ProducerError {
    /// Id of the message the error relates to, if one was assigned
    pub fn message_id(&self) -> Option<&str> {
        match self {
            ProducerError::PushFailed { message_id, .. } => Some(message_id),
            _ => None,
        }
    }
}

/// Sends messages to one topic
#[derive(Clone)]
pub struct ProducerCore {
    topic: Arc<str>,
    id_generator: Arc<dyn IdGenerator>,
    listener: Option<Arc<dyn ProducerListener>>,
}

impl std::fmt::Debug for ProducerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerCore")
            .field("topic", &self.topic)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

pub struct ProducerCoreBuilder {
    topic: String,
    id_generator: Arc<dyn IdGenerator>,
    listener: Option<Arc<dyn ProducerListener>>,
}

impl ProducerCoreBuilder {
    pub fn id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ProducerListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> Result<ProducerCore, ConfigurationError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "topic",
                "producer core",
            ));
        }
        Ok(ProducerCore {
            topic: Arc::from(self.topic),
            id_generator: self.id_generator,
            listener: self.listener,
        })
    }
}

impl ProducerCore {
    pub fn builder(topic: impl Into<String>) -> ProducerCoreBuilder {
        ProducerCoreBuilder {
            topic: topic.into(),
            id_generator: Arc::new(UuidV7Generator),
            listener: None,
        }
    }

    /// Producer for the configured topic with default id generation
    pub fn from_config(config: &ConduitConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Self::builder(config.topic.clone()).build()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Assign an id and push the message. Returns the assigned id.
    ///
    /// Any id already on the message is replaced.
    pub async fn send<P>(&self, backend: &P, mut message: Message) -> Result<String, ProducerError>
    where
        P: Pushable + ?Sized,
    {
        let id = self.id_generator.create();
        if id.is_empty() {
            return Err(ProducerError::EmptyMessageId);
        }
        message.assign_id(id.clone());

        if let Some(listener) = &self.listener {
            listener.prepare_send(&self.topic, &message, None).await;
        }

        match backend.push(&message).await {
            Ok(()) => {
                debug!(topic = %self.topic, message_id = %id, "📤 message pushed");
                if let Some(listener) = &self.listener {
                    listener.on_send_succeed(&self.topic, &message).await;
                }
                Ok(id)
            }
            Err(error) => {
                debug!(topic = %self.topic, message_id = %id, error = %error, "push failed");
                if let Some(listener) = &self.listener {
                    listener.on_send_fail(&self.topic, &message, &error).await;
                }
                Err(ProducerError::PushFailed {
                    message_id: id,
                    source: error,
                })
            }
        }
    }

    /// Wrap `data` in a new message and send it
    pub async fn send_data<P, T>(&self, backend: &P, data: &T) -> Result<String, ProducerError>
    where
        P: Pushable + ?Sized,
        T: Serialize + ?Sized,
    {
        let message = Message::new(data)?;
        self.send(backend, message).await
    }
}

/// A [`ProducerCore`] bound to a shared backend
#[derive(Debug)]
pub struct Producer<P: Pushable + ?Sized> {
    core: ProducerCore,
    backend: Arc<P>,
}

impl<P: Pushable + ?Sized> Clone for Producer<P> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl<P: Pushable + ?Sized> Producer<P> {
    pub fn new(core: ProducerCore, backend: Arc<P>) -> Self {
        Self { core, backend }
    }

    pub fn core(&self) -> &ProducerCore {
        &self.core
    }

    pub async fn send(&self, message: Message) -> Result<String, ProducerError> {
        self.core.send(self.backend.as_ref(), message).await
    }

    pub async fn send_data<T: Serialize + ?Sized>(&self, data: &T) -> Result<String, ProducerError> {
        self.core.send_data(self.backend.as_ref(), data).await
    }
}
