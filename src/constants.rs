//! # System Constants
//!
//! Defaults shared by the configuration layer and the programmatic builders.

use std::time::Duration;

/// Messages a deduplicate/compress window accumulates before flushing
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Time a deduplicate/compress window stays open before flushing
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery workers started when none are configured
pub const DEFAULT_DELIVERY_WORKERS: usize = 4;

/// Capacity of every channel between pipeline stages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// How long a graceful shutdown may take to drain in-flight messages
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Backoff defaults for failed fetches
pub mod backoff {
    use std::time::Duration;

    pub const IMMEDIATE_RETRIES: u32 = 3;
    pub const BASE_DELAY: Duration = Duration::from_millis(100);
    pub const MAX_DELAY: Duration = Duration::from_secs(30);
    pub const MULTIPLIER: f64 = 2.0;
}

/// Environment variable names
pub mod env {
    /// Runtime environment (development, test, production)
    pub const ENVIRONMENT: &str = "CONDUIT_ENV";
    /// Fallback runtime environment variable
    pub const APP_ENVIRONMENT: &str = "APP_ENV";
    /// Set to `json` for JSON log lines
    pub const LOG_FORMAT: &str = "CONDUIT_LOG_FORMAT";
    /// Prefix for configuration overrides, e.g. `CONDUIT__TOPIC`
    pub const CONFIG_PREFIX: &str = "CONDUIT";
}
