//! # Resilience Module
//!
//! Retry pacing for transport failures. Fetch workers consult a
//! [`BackoffPolicy`] after every failed fetch instead of spinning on the broker.
//!
//! ## Usage
//!
//! ```rust
//! use conduit_core::resilience::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy {
//!     immediate_retries: 2,
//!     base_delay: Duration::from_millis(50),
//!     max_delay: Duration::from_secs(5),
//!     multiplier: 2.0,
//! };
//!
//! assert_eq!(policy.delay_for(1), Duration::ZERO);
//! assert_eq!(policy.delay_for(3), Duration::from_millis(50));
//! ```

pub mod backoff;

pub use backoff::BackoffPolicy;
