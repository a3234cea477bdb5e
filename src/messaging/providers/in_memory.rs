//! # In-Memory Broker
//!
//! List-backed, in-process broker for testing and development.
//!
//! ## Features
//!
//! - **Wire Fidelity**: Messages are stored in their serialized form, so every
//!   push/fetch goes through the same encode/decode path a real backend would
//! - **Blocking Fetch**: `fetch` waits on a `tokio::sync::Notify` until a message arrives
//! - **Cancel-Safe**: Messages are popped synchronously, a dropped fetch never loses one
//! - **Thread-Safe**: Uses `parking_lot::Mutex` for the queue itself

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::Message;
use crate::messaging::traits::{Fetchable, Pushable};

/// In-memory FIFO broker for a single topic
///
/// # Example
///
/// ```rust
/// use conduit_core::messaging::{Fetchable, InMemoryBroker, Message, Pushable};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = InMemoryBroker::new("notify:email");
///
/// broker.push(&Message::new(&"hello")?.with_id("1")).await?;
/// let fetched = broker.fetch().await?;
///
/// assert_eq!(fetched.id(), "1");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryBroker {
    topic: String,
    /// Serialized messages in FIFO order
    queue: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
    partitions: usize,
    closed: AtomicBool,
    total_pushed: AtomicU64,
    total_fetched: AtomicU64,
}

impl InMemoryBroker {
    /// Create a single-partition broker
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_partitions(topic, 1)
    }

    /// Create a broker that reports `partitions` partitions
    ///
    /// Storage is still a single list; the count only drives the consumer's
    /// default fetch worker count.
    pub fn with_partitions(topic: impl Into<String>, partitions: usize) -> Self {
        Self {
            topic: topic.into(),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            partitions: partitions.max(1),
            closed: AtomicBool::new(false),
            total_pushed: AtomicU64::new(0),
            total_fetched: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Number of messages waiting (for testing)
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Append raw bytes as if a foreign producer wrote them (for testing)
    pub fn push_raw(&self, bytes: Vec<u8>) {
        self.queue.lock().push_back(bytes);
        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Close the broker. Pending messages can still be fetched; afterwards
    /// `fetch` fails with [`MessagingError::QueueClosed`] and `push` is rejected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed.load(Ordering::Relaxed)
    }

    pub fn total_fetched(&self) -> u64 {
        self.total_fetched.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Pushable for InMemoryBroker {
    async fn push(&self, message: &Message) -> MessagingResult<()> {
        if self.is_closed() {
            return Err(MessagingError::queue_closed(&self.topic));
        }
        let bytes = message.to_bytes()?;
        debug!(topic = %self.topic, message_id = %message.id(), "pushing message");
        self.push_raw(bytes);
        Ok(())
    }
}

#[async_trait]
impl Fetchable for InMemoryBroker {
    async fn fetch(&self) -> MessagingResult<Message> {
        loop {
            // Register interest before checking, so a close() racing with us is seen
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.queue.lock().pop_front();
            if let Some(bytes) = next {
                self.total_fetched.fetch_add(1, Ordering::Relaxed);
                return Message::from_bytes(&bytes);
            }
            if self.is_closed() {
                return Err(MessagingError::queue_closed(&self.topic));
            }
            notified.await;
        }
    }

    fn partition_count(&self) -> usize {
        self.partitions
    }
}
