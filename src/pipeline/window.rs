//! # Batch Windowing
//!
//! Count-or-time bounded accumulation shared by the deduplicate and compress
//! stages. A window closes when it holds `batch_size` messages or when
//! `timeout` has elapsed since it opened, whichever comes first. The deadline
//! is fixed when the window opens; arrivals never extend it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

use super::channels::{StageReceiver, StageSender};
use super::StageContext;
use crate::config::{ConfigResult, ConfigurationError};
use crate::constants;
use crate::messaging::Message;

/// Window bounds for the windowed stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWindowConfig {
    /// Max messages per window
    pub batch_size: usize,
    /// Max window duration
    pub timeout: Duration,
}

impl Default for BatchWindowConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            timeout: constants::DEFAULT_BATCH_TIMEOUT,
        }
    }
}

impl BatchWindowConfig {
    /// Validated constructor
    pub fn new(batch_size: usize, timeout: Duration) -> ConfigResult<Self> {
        let config = Self {
            batch_size,
            timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch_process.batch",
                self.batch_size,
                "batch size must be positive",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "batch_process.timeout_ms",
                self.timeout.as_millis(),
                "batch timeout must be positive",
            ));
        }
        Ok(())
    }
}

/// One flushed window
#[derive(Debug)]
pub struct Window {
    pub messages: Vec<Message>,
    /// The input channel closed while this window was open; no further windows follow
    pub input_closed: bool,
}

/// Accumulate one window from `input`
///
/// Returns with fewer than `batch_size` messages when the deadline passes
/// first, possibly with none at all.
pub async fn collect_window(input: &mut StageReceiver, config: &BatchWindowConfig) -> Window {
    // Deadlines past the clock's range are clamped by `sleep`
    let deadline = match Instant::now().checked_add(config.timeout) {
        Some(deadline) => sleep_until(deadline),
        None => sleep(config.timeout),
    };
    tokio::pin!(deadline);

    let mut messages = Vec::with_capacity(config.batch_size.min(constants::DEFAULT_CHANNEL_CAPACITY));
    while messages.len() < config.batch_size {
        tokio::select! {
            biased;
            _ = &mut deadline => break,
            next = input.recv() => match next {
                Some(message) => messages.push(message),
                None => {
                    return Window {
                        messages,
                        input_closed: true,
                    }
                }
            },
        }
    }

    Window {
        messages,
        input_closed: false,
    }
}

/// Run consecutive windows through `flush` until the input closes
///
/// `flush` is only invoked for non-empty windows. An empty window is a no-op
/// cycle. Stops early if the downstream channel is gone.
pub(crate) async fn drive_windows<F>(
    ctx: &StageContext,
    stage: &'static str,
    mut input: StageReceiver,
    output: StageSender,
    config: BatchWindowConfig,
    mut flush: F,
) where
    F: FnMut(Vec<Message>) -> Vec<Message> + Send,
{
    loop {
        let window = collect_window(&mut input, &config).await;
        let received = window.messages.len();

        if received > 0 {
            let outputs = flush(window.messages);
            debug!(
                topic = %ctx.topic,
                stage = stage,
                received = received,
                forwarded = outputs.len(),
                "window flushed"
            );
            if !ctx.forward_all(&output, outputs).await {
                debug!(topic = %ctx.topic, stage = stage, "downstream closed, stopping stage");
                return;
            }
        }

        if window.input_closed {
            return;
        }
    }
}
