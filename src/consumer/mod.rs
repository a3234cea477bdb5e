//! # Consumer Core
//!
//! Orchestrates fetch workers, the optional transform stages and the delivery
//! workers for one topic.
//!
//! ## Lifecycle
//!
//! 1. Build a [`ConsumerCore`] with [`ConsumerCore::builder`] or
//!    [`ConsumerCore::builder_from_config`]. All validation happens here.
//! 2. [`ConsumerCore::spawn`] starts every task and returns a [`ConsumerHandle`].
//! 3. [`ConsumerHandle::shutdown`] stops the fetch workers. Stages then drain
//!    their inputs and flush partial windows, and delivery workers drain the
//!    final channel before exiting.
//! 4. [`ConsumerHandle::join`] waits for all of it.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use conduit_core::consumer::{handler_fn, ConsumerCore};
//! use conduit_core::messaging::{InMemoryBroker, Message, Pushable};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = Arc::new(InMemoryBroker::new("notify:email"));
//! broker.push(&Message::new(&"hello")?.with_id("m1")).await?;
//!
//! let consumer = ConsumerCore::builder(
//!     "notify:email",
//!     handler_fn(|message: Message| async move {
//!         let body: String = message.decode()?;
//!         assert_eq!(body, "hello");
//!         Ok(())
//!     }),
//! )
//! .delivery_workers(2)
//! .build()?;
//!
//! let handle = consumer.spawn(broker.clone());
//! tokio::time::sleep(Duration::from_millis(50)).await;
//! handle.shutdown_and_join(Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

pub mod delivery;
pub mod fetch;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{ConduitConfig, ConfigurationError};
use crate::constants;
use crate::logging::{log_error, log_pipeline_operation};
use crate::messaging::{ConsumeListener, Fetchable, IdGenerator, MessagingError, UuidV7Generator};
use crate::pipeline::{
    self, dedup_window, wait_for_shutdown_signal, BatchWindowConfig, Compressor, Decompressor,
    Deduplicator, PipelineTopology, ShutdownSignal, StageContext, StageTransforms,
};
use crate::resilience::BackoffPolicy;

pub use delivery::{handler_fn, HandlerErrorPolicy, HandlerFn, MessageHandler};
pub use stats::{ConsumerStats, ConsumerStatsSnapshot};

use delivery::{run_delivery_worker, Delivery};
use fetch::FetchWorker;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Handler failure on message {message_id} escalated: {reason}")]
    HandlerEscalated { message_id: String, reason: String },

    #[error("Consumer did not drain within {timeout:?}; remaining tasks were aborted")]
    DrainTimeout { timeout: Duration },

    #[error("Consumer worker panicked: {message}")]
    WorkerPanicked { message: String },

    #[error("Fetch failed: {0}")]
    Fetch(#[from] MessagingError),

    #[error("Invalid consumer configuration: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// A validated, not yet running consumer for one topic
///
/// Cheap to clone; every spawn starts an independent set of workers.
#[derive(Clone)]
pub struct ConsumerCore {
    topic: Arc<str>,
    handler: Arc<dyn MessageHandler>,
    listener: Option<Arc<dyn ConsumeListener>>,
    transforms: StageTransforms,
    batch_window: BatchWindowConfig,
    delivery_workers: usize,
    fetch_workers: Option<usize>,
    channel_capacity: usize,
    handler_error_policy: HandlerErrorPolicy,
    backoff: BackoffPolicy,
    id_generator: Arc<dyn IdGenerator>,
    drop_expired: bool,
    shutdown_timeout: Duration,
}

impl std::fmt::Debug for ConsumerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerCore")
            .field("topic", &self.topic)
            .field("transforms", &self.transforms)
            .field("batch_window", &self.batch_window)
            .field("delivery_workers", &self.delivery_workers)
            .field("fetch_workers", &self.fetch_workers)
            .field("handler_error_policy", &self.handler_error_policy)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

/// Builder for [`ConsumerCore`]
pub struct ConsumerCoreBuilder {
    topic: String,
    handler: Arc<dyn MessageHandler>,
    listener: Option<Arc<dyn ConsumeListener>>,
    transforms: StageTransforms,
    batch_window: BatchWindowConfig,
    delivery_workers: usize,
    fetch_workers: Option<usize>,
    channel_capacity: usize,
    handler_error_policy: HandlerErrorPolicy,
    backoff: BackoffPolicy,
    id_generator: Arc<dyn IdGenerator>,
    drop_expired: bool,
    shutdown_timeout: Duration,
}

impl ConsumerCoreBuilder {
    pub fn listener(mut self, listener: Arc<dyn ConsumeListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Add the 1-to-N decompress stage
    pub fn decompress(mut self, decompressor: impl Decompressor) -> Self {
        self.transforms.decompress = Some(Arc::new(decompressor));
        self
    }

    /// Add the windowed deduplicate stage
    ///
    /// Duplicates are only detected within one batch window. The same key
    /// arriving in two different windows is delivered twice.
    pub fn deduplicate(mut self, deduplicator: impl Deduplicator) -> Self {
        self.transforms.deduplicate = Some(Arc::new(deduplicator));
        self
    }

    /// Add the windowed N-to-M compress stage
    pub fn compress(mut self, compressor: impl Compressor) -> Self {
        self.transforms.compress = Some(Arc::new(compressor));
        self
    }

    /// Window bounds for the deduplicate and compress stages
    pub fn batch_window(mut self, window: BatchWindowConfig) -> Self {
        self.batch_window = window;
        self
    }

    pub fn delivery_workers(mut self, count: usize) -> Self {
        self.delivery_workers = count;
        self
    }

    /// Override the default of one fetch worker per backend partition
    pub fn fetch_workers(mut self, count: usize) -> Self {
        self.fetch_workers = Some(count);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn handler_error_policy(mut self, policy: HandlerErrorPolicy) -> Self {
        self.handler_error_policy = policy;
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Generator for messages that reach the pipeline without an id
    pub fn id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    pub fn drop_expired(mut self, drop_expired: bool) -> Self {
        self.drop_expired = drop_expired;
        self
    }

    /// Drain timeout used by [`ConsumerCore::run_until_signal`]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ConsumerCore, ConfigurationError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "topic",
                "consumer core",
            ));
        }
        if self.delivery_workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "processors",
                0,
                "at least one delivery worker is required",
            ));
        }
        if self.fetch_workers == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "fetch_workers",
                0,
                "at least one fetch worker is required",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "channel_capacity",
                0,
                "channel capacity must be positive",
            ));
        }
        // The window only matters when a windowed stage exists
        if self.transforms.stage_set().has_windowed_stage() {
            self.batch_window.validate()?;
        }
        self.backoff
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value("backoff", self.backoff.multiplier, reason))?;

        Ok(ConsumerCore {
            topic: Arc::from(self.topic),
            handler: self.handler,
            listener: self.listener,
            transforms: self.transforms,
            batch_window: self.batch_window,
            delivery_workers: self.delivery_workers,
            fetch_workers: self.fetch_workers,
            channel_capacity: self.channel_capacity,
            handler_error_policy: self.handler_error_policy,
            backoff: self.backoff,
            id_generator: self.id_generator,
            drop_expired: self.drop_expired,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

impl ConsumerCore {
    pub fn builder(topic: impl Into<String>, handler: impl MessageHandler) -> ConsumerCoreBuilder {
        ConsumerCoreBuilder {
            topic: topic.into(),
            handler: Arc::new(handler),
            listener: None,
            transforms: StageTransforms::default(),
            batch_window: BatchWindowConfig::default(),
            delivery_workers: constants::DEFAULT_DELIVERY_WORKERS,
            fetch_workers: None,
            channel_capacity: constants::DEFAULT_CHANNEL_CAPACITY,
            handler_error_policy: HandlerErrorPolicy::default(),
            backoff: BackoffPolicy::default(),
            id_generator: Arc::new(UuidV7Generator),
            drop_expired: false,
            shutdown_timeout: constants::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Builder pre-populated from a loaded configuration. Transforms and
    /// listeners still have to be attached in code.
    pub fn builder_from_config(
        config: &ConduitConfig,
        handler: impl MessageHandler,
    ) -> ConsumerCoreBuilder {
        let mut builder = Self::builder(config.topic.clone(), handler)
            .batch_window(config.batch_window())
            .delivery_workers(config.processors)
            .channel_capacity(config.channel_capacity)
            .handler_error_policy(config.on_handler_error)
            .backoff(config.backoff_policy())
            .drop_expired(config.drop_expired)
            .shutdown_timeout(config.shutdown_timeout());
        if let Some(count) = config.fetch_workers {
            builder = builder.fetch_workers(count);
        }
        builder
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The pipeline shape this core will run against a backend with
    /// `partition_count` partitions
    pub fn topology(&self, partition_count: usize) -> PipelineTopology {
        let stages = self.transforms.stage_set();
        let batch_window = stages.has_windowed_stage().then_some(self.batch_window);
        PipelineTopology {
            stages,
            fetch_workers: self.fetch_workers.unwrap_or(partition_count).max(1),
            delivery_workers: self.delivery_workers,
            channel_capacity: self.channel_capacity,
            batch_window,
        }
    }

    fn stage_context(&self, stats: Arc<ConsumerStats>) -> StageContext {
        StageContext {
            topic: self.topic.clone(),
            id_generator: self.id_generator.clone(),
            stats,
        }
    }

    fn delivery(&self, ctx: StageContext) -> Delivery {
        Delivery {
            ctx,
            handler: self.handler.clone(),
            listener: self.listener.clone(),
            policy: self.handler_error_policy,
            drop_expired: self.drop_expired,
        }
    }

    /// Start every worker against `backend`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F: Fetchable + ?Sized>(&self, backend: Arc<F>) -> ConsumerHandle {
        let topology = self.topology(backend.partition_count());
        let shutdown = ShutdownSignal::new();
        let stats = Arc::new(ConsumerStats::default());
        let ctx = self.stage_context(stats.clone());
        let mut tasks = JoinSet::new();

        let (head, tail) = pipeline::assemble(
            &ctx,
            &self.transforms,
            self.batch_window,
            self.channel_capacity,
            &mut tasks,
        );

        for worker_id in 0..topology.fetch_workers {
            let worker = FetchWorker {
                worker_id,
                backend: backend.clone(),
                ctx: ctx.clone(),
                listener: self.listener.clone(),
                backoff: self.backoff.clone(),
                output: head.clone(),
                shutdown: shutdown.clone(),
            };
            tasks.spawn(async move {
                worker.run().await;
                Ok(())
            });
        }
        // Only fetch workers may hold the head sender, so the pipeline closes when they stop
        drop(head);

        let tail = tail.into_shared();
        for worker_id in 0..topology.delivery_workers {
            tasks.spawn(run_delivery_worker(
                worker_id,
                self.delivery(ctx.clone()),
                tail.clone(),
                shutdown.clone(),
            ));
        }

        let stage_names: Vec<&str> = topology.stages.iter().map(|kind| kind.as_str()).collect();
        let details = format!(
            "fetch_workers={} delivery_workers={} stages=[{}]",
            topology.fetch_workers,
            topology.delivery_workers,
            stage_names.join(",")
        );
        log_pipeline_operation("spawn", &self.topic, None, "running", Some(&details));

        ConsumerHandle {
            topic: self.topic.clone(),
            tasks,
            shutdown,
            stats,
            topology,
        }
    }

    /// Fetch one message and run it through the configured stages and the
    /// handler in the caller's task
    ///
    /// The deduplicate and compress stages see the decompressed output of this
    /// single fetch as one window. Returns how many messages reached the handler.
    pub async fn consume_once<F: Fetchable + ?Sized>(&self, backend: &F) -> Result<usize, ConsumerError> {
        let stats = Arc::new(ConsumerStats::default());
        let ctx = self.stage_context(stats.clone());

        let mut message = match backend.fetch().await {
            Ok(message) => message,
            Err(error) => {
                stats.record_fetch_error();
                if let Some(listener) = &self.listener {
                    listener.prepare_consume(&self.topic, None, Some(&error)).await;
                }
                return Err(ConsumerError::Fetch(error));
            }
        };
        ctx.ensure_id(&mut message);
        stats.record_fetched();
        if let Some(listener) = &self.listener {
            listener.prepare_consume(&self.topic, Some(&message), None).await;
        }

        let mut batch = match &self.transforms.decompress {
            Some(decompressor) => decompressor.decompress(message),
            None => vec![message],
        };
        if let Some(deduplicator) = &self.transforms.deduplicate {
            batch = dedup_window(deduplicator.as_ref(), batch).forwarded;
        }
        if let Some(compressor) = &self.transforms.compress {
            if !batch.is_empty() {
                batch = compressor.compress(batch);
            }
        }

        let delivery = self.delivery(ctx.clone());
        let mut delivered = 0;
        for mut message in batch {
            ctx.ensure_id(&mut message);
            if delivery.deliver(message).await? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Run until Ctrl+C, SIGTERM or an escalated handler failure, then drain
    pub async fn run_until_signal<F: Fetchable + ?Sized>(&self, backend: Arc<F>) -> Result<(), ConsumerError> {
        let handle = self.spawn(backend);
        let escalated = handle.shutdown_signal();

        tokio::select! {
            _ = wait_for_shutdown_signal() => {}
            _ = escalated.cancelled() => {
                warn!(topic = %self.topic, "consumer stopping after escalated handler failure");
            }
        }

        handle.shutdown_and_join(self.shutdown_timeout).await
    }
}

/// A running consumer
#[derive(Debug)]
pub struct ConsumerHandle {
    topic: Arc<str>,
    tasks: JoinSet<Result<(), ConsumerError>>,
    shutdown: ShutdownSignal,
    stats: Arc<ConsumerStats>,
    topology: PipelineTopology,
}

impl ConsumerHandle {
    /// Stop fetching and let the pipeline drain
    pub fn shutdown(&self) {
        info!(topic = %self.topic, "🛑 consumer shutdown requested");
        self.shutdown.trigger();
    }

    /// Clone of the signal shared by every worker
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> ConsumerStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn topology(&self) -> &PipelineTopology {
        &self.topology
    }

    /// Wait for every worker to finish
    ///
    /// Returns the first worker error, e.g. an escalated handler failure.
    pub async fn join(mut self) -> Result<(), ConsumerError> {
        self.join_all().await
    }

    /// Trigger shutdown and wait up to `timeout` for the pipeline to drain.
    /// Stragglers are aborted when the timeout elapses.
    pub async fn shutdown_and_join(mut self, timeout: Duration) -> Result<(), ConsumerError> {
        self.shutdown();
        match tokio::time::timeout(timeout, self.join_all()).await {
            Ok(result) => result,
            Err(_) => {
                error!(topic = %self.topic, timeout_ms = timeout.as_millis() as u64, "consumer drain timed out");
                self.tasks.abort_all();
                Err(ConsumerError::DrainTimeout { timeout })
            }
        }
    }

    async fn join_all(&mut self) -> Result<(), ConsumerError> {
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => Err(ConsumerError::WorkerPanicked {
                    message: join_error.to_string(),
                }),
                Err(_) => Ok(()),
            };
            if let Err(error) = outcome {
                log_error(
                    "consumer",
                    "join",
                    &error.to_string(),
                    Some(&format!("topic={}", self.topic)),
                );
                if first_error.is_none() {
                    first_error = Some(error);
                }
                // One failed worker stops the rest from starting new work
                self.shutdown.trigger();
            }
        }

        let snapshot = self.stats.snapshot();
        log_pipeline_operation(
            "join",
            &self.topic,
            None,
            if first_error.is_some() { "failed" } else { "stopped" },
            Some(&format!(
                "fetched={} delivered={} handler_failures={}",
                snapshot.fetched, snapshot.delivered, snapshot.handler_failures
            )),
        );

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A [`ConsumerCore`] bound to a shared backend
#[derive(Debug)]
pub struct Consumer<F: Fetchable + ?Sized> {
    core: ConsumerCore,
    backend: Arc<F>,
}

impl<F: Fetchable + ?Sized> Consumer<F> {
    pub fn new(core: ConsumerCore, backend: Arc<F>) -> Self {
        Self { core, backend }
    }

    pub fn core(&self) -> &ConsumerCore {
        &self.core
    }

    pub fn topology(&self) -> PipelineTopology {
        self.core.topology(self.backend.partition_count())
    }

    pub fn spawn(&self) -> ConsumerHandle {
        self.core.spawn(self.backend.clone())
    }

    pub async fn consume_once(&self) -> Result<usize, ConsumerError> {
        self.core.consume_once(self.backend.as_ref()).await
    }

    pub async fn run_until_signal(&self) -> Result<(), ConsumerError> {
        self.core.run_until_signal(self.backend.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{InMemoryBroker, Message, Pushable};
    use crate::pipeline::StageKind;

    fn noop_handler() -> impl MessageHandler {
        handler_fn(|_message: Message| async { Ok(()) })
    }

    #[test]
    fn test_build_validation() {
        assert!(ConsumerCore::builder("", noop_handler()).build().is_err());
        assert!(ConsumerCore::builder("t", noop_handler())
            .delivery_workers(0)
            .build()
            .is_err());
        assert!(ConsumerCore::builder("t", noop_handler())
            .fetch_workers(0)
            .build()
            .is_err());
        assert!(ConsumerCore::builder("t", noop_handler())
            .channel_capacity(0)
            .build()
            .is_err());
    }

    #[test]
    fn test_window_only_validated_with_windowed_stage() {
        let zero_window = BatchWindowConfig {
            batch_size: 0,
            timeout: Duration::from_secs(1),
        };

        assert!(ConsumerCore::builder("t", noop_handler())
            .batch_window(zero_window)
            .build()
            .is_ok());
        assert!(ConsumerCore::builder("t", noop_handler())
            .batch_window(zero_window)
            .deduplicate(|message: &Message| message.id().to_string())
            .build()
            .is_err());
    }

    #[test]
    fn test_topology_reflects_builder() {
        let core = ConsumerCore::builder("t", noop_handler())
            .compress(|messages: Vec<Message>| messages)
            .decompress(|message: Message| vec![message])
            .delivery_workers(3)
            .build()
            .unwrap();

        let topology = core.topology(6);
        assert_eq!(topology.stages(), vec![StageKind::Decompress, StageKind::Compress]);
        assert_eq!(topology.fetch_workers, 6);
        assert_eq!(topology.delivery_workers, 3);
        assert!(topology.batch_window.is_some());

        let direct = ConsumerCore::builder("t", noop_handler()).build().unwrap();
        let topology = direct.topology(0);
        assert!(topology.is_direct());
        assert_eq!(topology.fetch_workers, 1);
        assert!(topology.batch_window.is_none());
    }

    #[test]
    fn test_builder_from_config() {
        let mut config = ConduitConfig::for_topic("orders");
        config.processors = 7;
        config.fetch_workers = Some(2);
        config.on_handler_error = HandlerErrorPolicy::Escalate;

        let core = ConsumerCore::builder_from_config(&config, noop_handler())
            .build()
            .unwrap();
        let topology = core.topology(10);
        assert_eq!(core.topic(), "orders");
        assert_eq!(topology.delivery_workers, 7);
        assert_eq!(topology.fetch_workers, 2);
        assert_eq!(core.handler_error_policy, HandlerErrorPolicy::Escalate);
    }

    #[tokio::test]
    async fn test_consume_once_runs_stages_inline() {
        let broker = InMemoryBroker::new("t");
        broker
            .push(&Message::new(&["x", "y", "x"]).unwrap().with_id("batch"))
            .await
            .unwrap();

        let core = ConsumerCore::builder("t", noop_handler())
            .decompress(|message: Message| {
                let parts: Vec<String> = message.decode().unwrap_or_default();
                parts.iter().map(|p| Message::new(p).unwrap()).collect()
            })
            .deduplicate(|message: &Message| message.data().get().to_string())
            .build()
            .unwrap();

        assert_eq!(core.consume_once(&broker).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_consume_once_surfaces_fetch_error() {
        let broker = InMemoryBroker::new("t");
        broker.close();

        let core = ConsumerCore::builder("t", noop_handler()).build().unwrap();
        let err = core.consume_once(&broker).await.unwrap_err();
        assert!(matches!(err, ConsumerError::Fetch(MessagingError::QueueClosed { .. })));
    }

    #[tokio::test]
    async fn test_panicking_handler_surfaces_as_worker_panic() {
        let broker = Arc::new(InMemoryBroker::new("t"));
        broker.push(&Message::new(&1).unwrap().with_id("boom")).await.unwrap();

        let core = ConsumerCore::builder(
            "t",
            handler_fn(|message: Message| async move {
                if message.id() == "boom" {
                    panic!("handler blew up");
                }
                Ok::<(), anyhow::Error>(())
            }),
        )
        .delivery_workers(1)
        .build()
        .unwrap();

        let handle = core.spawn(broker);
        let err = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("consumer should stop after the panic")
            .unwrap_err();
        assert!(matches!(err, ConsumerError::WorkerPanicked { .. }));
    }
}
