//! # Fetch Workers
//!
//! Each worker loops on [`Fetchable::fetch`] and sends every message into the
//! head channel shared by all workers. Failed fetches are reported to the
//! listener and retried according to the [`BackoffPolicy`]. Both the fetch and
//! the backoff sleep race the shutdown signal.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::messaging::{ConsumeListener, Fetchable};
use crate::pipeline::{ShutdownSignal, StageContext, StageSender};
use crate::resilience::BackoffPolicy;

pub(crate) struct FetchWorker<F: Fetchable + ?Sized> {
    pub worker_id: usize,
    pub backend: Arc<F>,
    pub ctx: StageContext,
    pub listener: Option<Arc<dyn ConsumeListener>>,
    pub backoff: BackoffPolicy,
    pub output: StageSender,
    pub shutdown: ShutdownSignal,
}

impl<F: Fetchable + ?Sized> FetchWorker<F> {
    pub async fn run(self) {
        let topic = self.ctx.topic.clone();
        let mut attempt: u32 = 0;
        debug!(topic = %topic, worker = self.worker_id, "fetch worker started");

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.backend.fetch() => result,
            };

            match result {
                Ok(mut message) => {
                    attempt = 0;
                    self.ctx.ensure_id(&mut message);
                    self.ctx.stats.record_fetched();

                    if let Some(listener) = &self.listener {
                        listener.prepare_consume(&topic, Some(&message), None).await;
                    }

                    if self.output.send(message).await.is_err() {
                        debug!(topic = %topic, worker = self.worker_id, "pipeline closed, stopping fetch worker");
                        break;
                    }
                }
                Err(error) => {
                    attempt = attempt.saturating_add(1);
                    self.ctx.stats.record_fetch_error();

                    if let Some(listener) = &self.listener {
                        listener.prepare_consume(&topic, None, Some(&error)).await;
                    }

                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        topic = %topic,
                        worker = self.worker_id,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        transport = error.is_transport(),
                        error = %error,
                        "fetch failed, retrying"
                    );

                    if delay.is_zero() {
                        // Immediate retries still give other tasks a turn
                        tokio::task::yield_now().await;
                    } else {
                        tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        info!(topic = %topic, worker = self.worker_id, "fetch worker stopped");
    }
}
