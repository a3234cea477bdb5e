//! # Fetch Backoff Policy
//!
//! Capped exponential backoff for fetch workers. The first few failed attempts
//! retry immediately; after that the delay grows by `multiplier` per attempt up
//! to `max_delay`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::backoff as defaults;

/// Backoff policy injected into every fetch worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Consecutive failures retried without any delay
    pub immediate_retries: u32,
    /// Delay of the first non-immediate retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            immediate_retries: defaults::IMMEDIATE_RETRIES,
            base_delay: defaults::BASE_DELAY,
            max_delay: defaults::MAX_DELAY,
            multiplier: defaults::MULTIPLIER,
        }
    }
}

impl BackoffPolicy {
    /// Retry every failure immediately. Reproduces a busy-retry fetch loop.
    pub fn immediate() -> Self {
        Self {
            immediate_retries: u32::MAX,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retrying after the `attempt`-th consecutive failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= self.immediate_retries {
            return Duration::ZERO;
        }

        let exponent = (attempt - self.immediate_retries - 1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        let delay_secs = self.base_delay.as_secs_f64() * factor;

        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "backoff multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(format!(
                "backoff base delay {:?} exceeds max delay {:?}",
                self.base_delay, self.max_delay
            ));
        }
        Ok(())
    }
}
