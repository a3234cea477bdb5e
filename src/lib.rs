#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Conduit Core
//!
//! Backend-agnostic message queue client core with a staged, batch-windowed
//! consumption pipeline.
//!
//! ## Overview
//!
//! Application code produces and consumes discrete messages on a named topic.
//! Concrete brokers plug in through two capability traits,
//! [`Fetchable`](messaging::Fetchable) and [`Pushable`](messaging::Pushable);
//! everything above them is shared.
//!
//! ## Architecture
//!
//! ```text
//! ProducerCore ──▶ Pushable
//!
//! Fetchable ──▶ fetch workers ──▶ [decompress] ──▶ [deduplicate] ──▶ [compress] ──▶ delivery workers ──▶ handler
//! ```
//!
//! - Fetch workers retry failed fetches with a capped exponential [`BackoffPolicy`]
//! - The deduplicate and compress stages work on count-or-time bounded windows
//! - Lifecycle listeners observe every produce and consume transition
//! - Shutdown drains in-flight messages through every stage before returning
//!
//! ## Module Organization
//!
//! - [`messaging`] - Message envelope, backend traits, listeners, id generation
//! - [`pipeline`] - Stage ordering, batch windows, transform stages, shutdown
//! - [`consumer`] - Consumer core, fetch and delivery workers, stats
//! - [`producer`] - Producer core
//! - [`config`] - File/environment configuration
//! - [`resilience`] - Fetch backoff
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use conduit_core::{handler_fn, ConsumerCore, InMemoryBroker, Message, ProducerCore};
//!
//! # #[tokio::main]
//! # async fn main() -> conduit_core::Result<()> {
//! let broker = Arc::new(InMemoryBroker::new("notify:email"));
//!
//! let producer = ProducerCore::builder("notify:email").build()?;
//! producer.send_data(broker.as_ref(), &"welcome!").await?;
//!
//! let consumer = ConsumerCore::builder(
//!     "notify:email",
//!     handler_fn(|message: Message| async move {
//!         let body: String = message.decode()?;
//!         println!("{body}");
//!         Ok(())
//!     }),
//! )
//! .build()?;
//!
//! let handle = consumer.spawn(broker);
//! tokio::time::sleep(Duration::from_millis(50)).await;
//! handle.shutdown_and_join(Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod producer;
pub mod resilience;

pub use config::{ConduitConfig, ConfigLoader, ConfigurationError};
pub use consumer::{
    handler_fn, Consumer, ConsumerCore, ConsumerError, ConsumerHandle, ConsumerStatsSnapshot,
    HandlerErrorPolicy, MessageHandler,
};
pub use error::{ConduitError, Result};
pub use logging::init_structured_logging;
pub use messaging::{
    ConsumeListener, Fetchable, IdGenerator, InMemoryBroker, Message, MessagingError,
    ProducerListener, Pushable, TracingListener,
};
pub use pipeline::{BatchWindowConfig, PipelineTopology, ShutdownSignal, StageKind};
pub use producer::{Producer, ProducerCore, ProducerError};
pub use resilience::BackoffPolicy;
