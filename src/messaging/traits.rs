//! # Backend Capability Traits
//!
//! The two seams every broker adapter implements. The producer and consumer
//! cores only ever talk to a backend through these.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::MessagingResult;
use super::message::Message;

/// A backend that messages can be fetched from, one at a time
///
/// `fetch` waits until a message is available or the transport fails. It never
/// resolves to "nothing": an empty queue keeps the future pending.
///
/// The consumer core wraps every `fetch` call in a `select!` against its
/// shutdown signal, so implementations must be cancel-safe: dropping the
/// future before it resolves must not lose a message.
#[async_trait]
pub trait Fetchable: Send + Sync + 'static {
    /// Fetch the next message
    async fn fetch(&self) -> MessagingResult<Message>;

    /// Number of partitions behind this backend
    ///
    /// Used as the default number of fetch workers. List-backed brokers have one.
    fn partition_count(&self) -> usize {
        1
    }
}

/// A backend that messages can be pushed to
///
/// Implementations must be safe to call concurrently from several producer cores
/// sharing one adapter.
#[async_trait]
pub trait Pushable: Send + Sync + 'static {
    /// Push one message
    async fn push(&self, message: &Message) -> MessagingResult<()>;
}

#[async_trait]
impl<T: Fetchable + ?Sized> Fetchable for Arc<T> {
    async fn fetch(&self) -> MessagingResult<Message> {
        (**self).fetch().await
    }

    fn partition_count(&self) -> usize {
        (**self).partition_count()
    }
}

#[async_trait]
impl<T: Pushable + ?Sized> Pushable for Arc<T> {
    async fn push(&self, message: &Message) -> MessagingResult<()> {
        (**self).push(message).await
    }
}
