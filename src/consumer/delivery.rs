//! # Delivery
//!
//! Hands pipeline output to user handler code, wrapped in the consume listener
//! hooks. A pool of delivery workers shares the final stage channel.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::ConsumerError;
use crate::messaging::{ConsumeListener, Message};
use crate::pipeline::{SharedStageReceiver, ShutdownSignal, StageContext};

/// User code invoked once per delivered message
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, topic: &str, message: &Message) -> anyhow::Result<()>;
}

/// Adapter turning an async closure over an owned [`Message`] into a handler
///
/// ```rust
/// use conduit_core::consumer::handler_fn;
/// use conduit_core::messaging::Message;
///
/// let handler = handler_fn(|message: Message| async move {
///     let body: String = message.decode()?;
///     println!("{body}");
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    HandlerFn(f)
}

/// See [`handler_fn`]
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, _topic: &str, message: &Message) -> anyhow::Result<()> {
        (self.0)(message.clone()).await
    }
}

/// What a handler error does to the consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerErrorPolicy {
    /// Report to the listener and keep consuming
    #[default]
    Report,
    /// Shut the whole consumer down and surface the error from `join`
    Escalate,
}

/// Everything needed to deliver one message
#[derive(Clone)]
pub(crate) struct Delivery {
    pub ctx: StageContext,
    pub handler: Arc<dyn MessageHandler>,
    pub listener: Option<Arc<dyn ConsumeListener>>,
    pub policy: HandlerErrorPolicy,
    pub drop_expired: bool,
}

impl Delivery {
    /// Deliver one message. Returns `Ok(false)` if it was dropped as expired.
    ///
    /// Only an escalated handler failure is an error; reported failures are
    /// counted and swallowed.
    pub async fn deliver(&self, message: Message) -> Result<bool, ConsumerError> {
        let topic: &str = &self.ctx.topic;

        if self.drop_expired && message.is_expired(Utc::now()) {
            self.ctx.stats.record_expired_dropped();
            debug!(topic = %topic, message_id = %message.id(), "dropping expired message");
            return Ok(false);
        }

        if let Some(listener) = &self.listener {
            listener.prepare_consume(topic, Some(&message), None).await;
        }

        let error = match self.handler.handle(topic, &message).await {
            Ok(()) => {
                self.ctx.stats.record_delivered();
                if let Some(listener) = &self.listener {
                    listener.on_consume_succeed(topic, &message).await;
                }
                return Ok(true);
            }
            Err(error) => error,
        };

        self.ctx.stats.record_handler_failure();
        match &self.listener {
            Some(listener) => listener.on_consume_fail(topic, &message, &error).await,
            None => debug!(
                topic = %topic,
                message_id = %message.id(),
                error = %error,
                "handler failed"
            ),
        }

        match self.policy {
            HandlerErrorPolicy::Report => Ok(true),
            HandlerErrorPolicy::Escalate => Err(ConsumerError::HandlerEscalated {
                message_id: message.id().to_string(),
                reason: format!("{error:#}"),
            }),
        }
    }
}

/// One delivery worker; runs until the final channel is drained and closed
pub(crate) async fn run_delivery_worker(
    worker_id: usize,
    delivery: Delivery,
    input: SharedStageReceiver,
    shutdown: ShutdownSignal,
) -> Result<(), ConsumerError> {
    debug!(topic = %delivery.ctx.topic, worker = worker_id, "delivery worker started");

    loop {
        let next = {
            let mut receiver = input.lock().await;
            receiver.recv().await
        };
        let Some(message) = next else {
            break;
        };

        if let Err(err) = delivery.deliver(message).await {
            error!(
                topic = %delivery.ctx.topic,
                worker = worker_id,
                error = %err,
                "handler failure escalated, shutting consumer down"
            );
            shutdown.trigger();
            return Err(err);
        }
    }

    info!(topic = %delivery.ctx.topic, worker = worker_id, "delivery worker drained");
    Ok(())
}
