//! Compress stage: hands every non-empty batch window to an N-to-M transform
//! and forwards whatever it returns.

use std::sync::Arc;

use super::channels::{StageReceiver, StageSender};
use super::window::{drive_windows, BatchWindowConfig};
use super::StageContext;
use crate::messaging::Message;

/// N-to-M transform over one window
pub trait Compressor: Send + Sync + 'static {
    fn compress(&self, messages: Vec<Message>) -> Vec<Message>;
}

impl<F> Compressor for F
where
    F: Fn(Vec<Message>) -> Vec<Message> + Send + Sync + 'static,
{
    fn compress(&self, messages: Vec<Message>) -> Vec<Message> {
        self(messages)
    }
}

pub(crate) async fn run_compress_stage(
    ctx: StageContext,
    compressor: Arc<dyn Compressor>,
    input: StageReceiver,
    output: StageSender,
    config: BatchWindowConfig,
) {
    drive_windows(&ctx, "compress", input, output, config, |messages| {
        compressor.compress(messages)
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channels::ChannelFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_windows_are_merged_and_empty_windows_skipped() {
        let (in_tx, in_rx) = ChannelFactory::stage_channel(8);
        let (out_tx, mut out_rx) = ChannelFactory::stage_channel(8);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let merge = move |messages: Vec<Message>| {
            counter.fetch_add(1, Ordering::SeqCst);
            let ids: Vec<String> = messages.iter().map(|m| m.id().to_string()).collect();
            vec![Message::new(&ids).unwrap()]
        };

        let stage = tokio::spawn(run_compress_stage(
            StageContext::for_tests("orders"),
            Arc::new(merge),
            in_rx,
            out_tx,
            BatchWindowConfig::new(2, Duration::from_millis(100)).unwrap(),
        ));

        for id in ["a", "b", "c"] {
            in_tx.send(Message::new(&id).unwrap().with_id(id)).await.unwrap();
        }
        // Let a few empty windows pass
        tokio::time::sleep(Duration::from_millis(350)).await;
        drop(in_tx);
        stage.await.unwrap();

        let first = out_rx.recv().await.unwrap();
        let second = out_rx.recv().await.unwrap();
        assert!(out_rx.recv().await.is_none());

        assert_eq!(first.decode::<Vec<String>>().unwrap(), vec!["a", "b"]);
        assert_eq!(second.decode::<Vec<String>>().unwrap(), vec!["c"]);
        assert!(first.has_id() && second.has_id());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
