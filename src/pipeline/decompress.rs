//! Decompress stage: expands one message into zero or more, forwarding each
//! output immediately and in order. No batching.

use std::sync::Arc;

use tracing::debug;

use super::channels::{StageReceiver, StageSender};
use super::StageContext;
use crate::messaging::Message;

/// 1-to-N transform
///
/// Transforms are total. A message that cannot be expanded should map to an
/// empty vector.
pub trait Decompressor: Send + Sync + 'static {
    fn decompress(&self, message: Message) -> Vec<Message>;
}

impl<F> Decompressor for F
where
    F: Fn(Message) -> Vec<Message> + Send + Sync + 'static,
{
    fn decompress(&self, message: Message) -> Vec<Message> {
        self(message)
    }
}

pub(crate) async fn run_decompress_stage(
    ctx: StageContext,
    decompressor: Arc<dyn Decompressor>,
    mut input: StageReceiver,
    output: StageSender,
) {
    while let Some(message) = input.recv().await {
        let outputs = decompressor.decompress(message);
        if !ctx.forward_all(&output, outputs).await {
            debug!(topic = %ctx.topic, stage = "decompress", "downstream closed, stopping stage");
            return;
        }
    }
}
