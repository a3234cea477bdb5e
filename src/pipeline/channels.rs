//! # Stage Channel Wrappers
//!
//! Strongly-typed wrappers around the bounded `mpsc` channels that connect
//! pipeline stages. The final channel is read by several delivery workers, so
//! its receiver is shared behind an async mutex.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (tx, rx) = ChannelFactory::stage_channel(1024);
//! let shared = rx.into_shared();
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::messaging::Message;

/// Sending half of a stage channel. Cloned once per fetch worker.
#[derive(Debug, Clone)]
pub struct StageSender(pub(crate) mpsc::Sender<Message>);

/// Receiving half of a stage channel, owned by exactly one stage task
#[derive(Debug)]
pub struct StageReceiver(pub(crate) mpsc::Receiver<Message>);

/// Final-channel receiver shared by all delivery workers
pub type SharedStageReceiver = Arc<Mutex<StageReceiver>>;

impl StageSender {
    /// Send a message, waiting for capacity. Fails once the receiver is gone.
    pub async fn send(&self, message: Message) -> Result<(), mpsc::error::SendError<Message>> {
        self.0.send(message).await
    }
}

impl StageReceiver {
    /// Receive the next message; `None` once every sender is dropped and the buffer is empty
    pub async fn recv(&mut self) -> Option<Message> {
        self.0.recv().await
    }

    pub fn into_shared(self) -> SharedStageReceiver {
        Arc::new(Mutex::new(self))
    }
}

pub struct ChannelFactory;

impl ChannelFactory {
    /// Create a bounded channel between two stages
    pub fn stage_channel(capacity: usize) -> (StageSender, StageReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (StageSender(tx), StageReceiver(rx))
    }
}
