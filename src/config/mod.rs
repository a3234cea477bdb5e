//! # Conduit Configuration System
//!
//! Declarative configuration for producer and consumer cores, loadable from a
//! YAML/JSON/TOML file with `CONDUIT__*` environment overrides layered on top.
//!
//! ## Architecture
//!
//! - **Serde Defaults**: Every optional field falls back to the values in [`crate::constants`]
//! - **Explicit Validation**: [`ConduitConfig::validate`] fails fast before any worker starts
//! - **Environment Overrides**: `CONDUIT__BATCH_PROCESS__BATCH=50` overrides `batch_process.batch`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use conduit_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load_file("config/conduit.yaml")?;
//!
//! let window = config.batch_window();
//! let workers = config.processors;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;
use crate::consumer::HandlerErrorPolicy;
use crate::pipeline::BatchWindowConfig;
use crate::resilience::BackoffPolicy;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration for one topic's producer and consumer
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConduitConfig {
    /// Topic name
    #[serde(default)]
    pub topic: String,

    /// Number of delivery workers handing messages to the handler
    #[serde(default = "default_processors")]
    pub processors: usize,

    /// Number of fetch workers; defaults to the backend's partition count
    #[serde(default)]
    pub fetch_workers: Option<usize>,

    /// Capacity of every channel between pipeline stages
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Windowing for the deduplicate and compress stages
    #[serde(default)]
    pub batch_process: BatchProcessConfig,

    /// Retry pacing for failed fetches
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// What a handler failure does to the consumer
    #[serde(default)]
    pub on_handler_error: HandlerErrorPolicy,

    /// Skip messages whose `expire_at` has passed instead of handling them
    #[serde(default)]
    pub drop_expired: bool,

    /// Upper bound for draining in-flight messages on shutdown
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

/// Batch window settings, ignored when no deduplicate/compress stage is configured
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchProcessConfig {
    /// Max messages per window
    #[serde(default = "default_batch")]
    pub batch: usize,

    /// Max window duration in milliseconds
    #[serde(default = "default_batch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BatchProcessConfig {
    fn default() -> Self {
        Self {
            batch: default_batch(),
            timeout_ms: default_batch_timeout_ms(),
        }
    }
}

/// Fetch backoff settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default = "default_immediate_retries")]
    pub immediate_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            immediate_retries: default_immediate_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl BackoffConfig {
    pub fn to_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            immediate_retries: self.immediate_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
        }
    }
}

impl ConduitConfig {
    /// Configuration with defaults for everything but the topic
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            processors: default_processors(),
            fetch_workers: None,
            channel_capacity: default_channel_capacity(),
            batch_process: BatchProcessConfig::default(),
            backoff: BackoffConfig::default(),
            on_handler_error: HandlerErrorPolicy::default(),
            drop_expired: false,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }

    /// Validate every field, failing on the first violation
    ///
    /// `batch_process` is left to [`ConsumerCoreBuilder::build`](crate::consumer::ConsumerCoreBuilder::build),
    /// which only checks it when a windowed stage is attached.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.topic.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "topic",
                "conduit configuration",
            ));
        }
        if self.processors == 0 {
            return Err(ConfigurationError::invalid_value(
                "processors",
                self.processors,
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
                self.channel_capacity,
                "channel capacity must be positive",
            ));
        }
        self.backoff
            .to_policy()
            .validate()
            .map_err(|reason| ConfigurationError::invalid_value("backoff", self.backoff.multiplier, reason))?;
        Ok(())
    }

    pub fn batch_window(&self) -> BatchWindowConfig {
        BatchWindowConfig {
            batch_size: self.batch_process.batch,
            timeout: Duration::from_millis(self.batch_process.timeout_ms),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        self.backoff.to_policy()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_processors() -> usize {
    constants::DEFAULT_DELIVERY_WORKERS
}

fn default_channel_capacity() -> usize {
    constants::DEFAULT_CHANNEL_CAPACITY
}

fn default_shutdown_timeout_ms() -> u64 {
    constants::DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64
}

fn default_batch() -> usize {
    constants::DEFAULT_BATCH_SIZE
}

fn default_batch_timeout_ms() -> u64 {
    constants::DEFAULT_BATCH_TIMEOUT.as_millis() as u64
}

fn default_immediate_retries() -> u32 {
    constants::backoff::IMMEDIATE_RETRIES
}

fn default_base_delay_ms() -> u64 {
    constants::backoff::BASE_DELAY.as_millis() as u64
}

fn default_max_delay_ms() -> u64 {
    constants::backoff::MAX_DELAY.as_millis() as u64
}

fn default_multiplier() -> f64 {
    constants::backoff::MULTIPLIER
}
