//! # Deduplicate Stage
//!
//! Drops messages whose key was already seen **within the same batch window**.
//! The `seen` set is cleared at every window boundary, so a duplicate that
//! lands in the next window is forwarded again. Memory use is bounded by the
//! window size in exchange for that.

use std::collections::HashSet;
use std::sync::Arc;

use super::channels::{StageReceiver, StageSender};
use super::window::{drive_windows, BatchWindowConfig};
use super::StageContext;
use crate::messaging::Message;

/// Key extractor for deduplication
pub trait Deduplicator: Send + Sync + 'static {
    fn key_of(&self, message: &Message) -> String;
}

impl<F> Deduplicator for F
where
    F: Fn(&Message) -> String + Send + Sync + 'static,
{
    fn key_of(&self, message: &Message) -> String {
        self(message)
    }
}

/// Result of deduplicating one window
#[derive(Debug)]
pub struct DedupOutcome {
    /// First arrival of every key, in arrival order
    pub forwarded: Vec<Message>,
    pub dropped: usize,
}

/// Deduplicate one window's worth of messages with a fresh `seen` set
pub fn dedup_window<D>(deduplicator: &D, messages: Vec<Message>) -> DedupOutcome
where
    D: Deduplicator + ?Sized,
{
    let mut seen = HashSet::with_capacity(messages.len());
    let mut forwarded = Vec::with_capacity(messages.len());
    let mut dropped = 0;

    for message in messages {
        if seen.insert(deduplicator.key_of(&message)) {
            forwarded.push(message);
        } else {
            dropped += 1;
        }
    }

    DedupOutcome { forwarded, dropped }
}

pub(crate) async fn run_deduplicate_stage(
    ctx: StageContext,
    deduplicator: Arc<dyn Deduplicator>,
    input: StageReceiver,
    output: StageSender,
    config: BatchWindowConfig,
) {
    let stats = ctx.stats.clone();
    drive_windows(&ctx, "deduplicate", input, output, config, |messages| {
        let outcome = dedup_window(deduplicator.as_ref(), messages);
        stats.record_duplicates_dropped(outcome.dropped);
        outcome.forwarded
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channels::ChannelFactory;
    use std::time::Duration;

    fn keyed(key: &str, id: &str) -> Message {
        Message::new(&key).unwrap().with_id(id)
    }

    fn payload_key(message: &Message) -> String {
        message.decode::<String>().unwrap_or_default()
    }

    #[test]
    fn test_first_arrival_wins() {
        let messages = vec![keyed("a", "1"), keyed("b", "2"), keyed("a", "3")];
        let outcome = dedup_window(&payload_key, messages);

        let ids: Vec<&str> = outcome.forwarded.iter().map(Message::id).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(outcome.dropped, 1);
    }

    #[test]
    fn test_empty_window() {
        let outcome = dedup_window(&payload_key, Vec::new());
        assert!(outcome.forwarded.is_empty());
        assert_eq!(outcome.dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicates_across_windows_are_not_detected() {
        let (in_tx, in_rx) = ChannelFactory::stage_channel(8);
        let (out_tx, mut out_rx) = ChannelFactory::stage_channel(8);
        let ctx = StageContext::for_tests("orders");
        let stats = ctx.stats.clone();

        let stage = tokio::spawn(run_deduplicate_stage(
            ctx,
            Arc::new(payload_key),
            in_rx,
            out_tx,
            BatchWindowConfig::new(2, Duration::from_secs(10)).unwrap(),
        ));

        // Window 1: a, a  Window 2: a
        for (key, id) in [("a", "1"), ("a", "2"), ("a", "3")] {
            in_tx.send(keyed(key, id)).await.unwrap();
        }
        drop(in_tx);
        stage.await.unwrap();

        let mut ids = Vec::new();
        while let Some(message) = out_rx.recv().await {
            ids.push(message.id().to_string());
        }
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(stats.snapshot().duplicates_dropped, 1);
    }
}
