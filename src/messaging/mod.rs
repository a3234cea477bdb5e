//! # Messaging Module
//!
//! The message envelope, the backend capability traits every broker adapter
//! implements, id generation and lifecycle listeners.

pub mod errors;
pub mod id_generator;
pub mod listener;
pub mod message;
pub mod providers;
pub mod traits;

pub use errors::{MessagingError, MessagingResult};
pub use id_generator::{IdGenerator, UuidV4Generator, UuidV7Generator};
pub use listener::{ConsumeListener, ProducerListener, TracingListener};
pub use message::{Message, MessageBuilder};
pub use providers::InMemoryBroker;
pub use traits::{Fetchable, Pushable};
