use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use conduit_core::consumer::MessageHandler;
use conduit_core::messaging::{
    ConsumeListener, Fetchable, Message, MessagingError, MessagingResult, ProducerListener,
    Pushable,
};
use parking_lot::Mutex;

/// Backend whose every push fails, counting attempts
#[derive(Debug, Default)]
pub struct FailingPushable {
    attempts: AtomicUsize,
}

impl FailingPushable {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pushable for FailingPushable {
    async fn push(&self, _message: &Message) -> MessagingResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MessagingError::push("mock", "broker unavailable"))
    }
}

/// Backend that replays a fixed script of fetch results, then waits forever
#[derive(Debug, Default)]
pub struct ScriptedFetchable {
    script: Mutex<VecDeque<MessagingResult<Message>>>,
}

impl ScriptedFetchable {
    pub fn new(script: Vec<MessagingResult<Message>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl Fetchable for ScriptedFetchable {
    async fn fetch(&self) -> MessagingResult<Message> {
        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

/// Every hook a [`RecordingListener`] observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    PrepareSend(String),
    SendSucceed(String),
    SendFail(String),
    PrepareConsume {
        message_id: Option<String>,
        failed: bool,
    },
    ConsumeSucceed(String),
    ConsumeFail(String),
}

#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    /// Events concerning one message, in order
    pub fn events_for(&self, message_id: &str) -> Vec<ListenerEvent> {
        self.events()
            .into_iter()
            .filter(|event| match event {
                ListenerEvent::PrepareSend(id)
                | ListenerEvent::SendSucceed(id)
                | ListenerEvent::SendFail(id)
                | ListenerEvent::ConsumeSucceed(id)
                | ListenerEvent::ConsumeFail(id) => id == message_id,
                ListenerEvent::PrepareConsume { message_id: id, .. } => {
                    id.as_deref() == Some(message_id)
                }
            })
            .collect()
    }

    fn record(&self, event: ListenerEvent) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl ProducerListener for RecordingListener {
    async fn prepare_send(&self, _topic: &str, message: &Message, _error: Option<&MessagingError>) {
        self.record(ListenerEvent::PrepareSend(message.id().to_string()));
    }

    async fn on_send_succeed(&self, _topic: &str, message: &Message) {
        self.record(ListenerEvent::SendSucceed(message.id().to_string()));
    }

    async fn on_send_fail(&self, _topic: &str, message: &Message, _error: &MessagingError) {
        self.record(ListenerEvent::SendFail(message.id().to_string()));
    }
}

#[async_trait]
impl ConsumeListener for RecordingListener {
    async fn prepare_consume(
        &self,
        _topic: &str,
        message: Option<&Message>,
        error: Option<&MessagingError>,
    ) {
        self.record(ListenerEvent::PrepareConsume {
            message_id: message.map(|m| m.id().to_string()),
            failed: error.is_some(),
        });
    }

    async fn on_consume_succeed(&self, _topic: &str, message: &Message) {
        self.record(ListenerEvent::ConsumeSucceed(message.id().to_string()));
    }

    async fn on_consume_fail(&self, _topic: &str, message: &Message, _error: &anyhow::Error) {
        self.record(ListenerEvent::ConsumeFail(message.id().to_string()));
    }
}

/// Handler that records every message it sees and fails on selected ids
#[derive(Debug, Clone, Default)]
pub struct CollectingHandler {
    seen: Arc<Mutex<Vec<Message>>>,
    fail_on: Arc<HashSet<String>>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            seen: Arc::default(),
            fail_on: Arc::new(ids.iter().map(|id| id.to_string()).collect()),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.seen.lock().iter().map(|m| m.id().to_string()).collect()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl MessageHandler for CollectingHandler {
    async fn handle(&self, _topic: &str, message: &Message) -> anyhow::Result<()> {
        self.seen.lock().push(message.clone());
        if self.fail_on.contains(message.id()) {
            return Err(anyhow!("handler rejected {}", message.id()));
        }
        Ok(())
    }
}

/// Handler that never completes
#[derive(Debug, Default)]
pub struct StuckHandler;

#[async_trait]
impl MessageHandler for StuckHandler {
    async fn handle(&self, _topic: &str, _message: &Message) -> anyhow::Result<()> {
        std::future::pending().await
    }
}

/// A message whose payload and id are both `key`
pub fn keyed_message(key: &str) -> Message {
    Message::new(key).expect("string payload serializes").with_id(key)
}

/// Key extractor using the decoded string payload
pub fn payload_key(message: &Message) -> String {
    message.decode::<String>().unwrap_or_default()
}

/// A message with payload `key` and an explicit id
pub fn keyed(key: &str, id: &str) -> Message {
    Message::new(key).expect("string payload serializes").with_id(id)
}
