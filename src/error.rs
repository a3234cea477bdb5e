//! Crate-level error type unifying every failure surface of the producer and
//! consumer cores.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::consumer::ConsumerError;
use crate::messaging::MessagingError;
use crate::producer::ProducerError;

#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),

    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),
}

pub type Result<T> = std::result::Result<T, ConduitError>;
