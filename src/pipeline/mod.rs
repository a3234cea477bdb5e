//! # Consumption Pipeline
//!
//! The optional transform stages between fetch and delivery, and the plumbing
//! that connects them.
//!
//! ## Stage Order
//!
//! Stages always run as `decompress → deduplicate → compress`, whatever order
//! they were configured in. Absent stages are skipped entirely: with no stage
//! configured, fetch workers feed the delivery workers through a single channel.
//!
//! ```text
//! fetch workers ──▶ [decompress] ──▶ [deduplicate] ──▶ [compress] ──▶ delivery workers
//! ```
//!
//! Each present stage is a single tokio task that owns its input receiver and
//! all of its window state. Channels are bounded, so a slow handler
//! back-pressures all the way to the fetch workers.

pub mod channels;
pub mod compress;
pub mod decompress;
pub mod deduplicate;
pub mod shutdown;
pub mod window;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::consumer::{ConsumerError, ConsumerStats};
use crate::logging::log_pipeline_operation;
use crate::messaging::{IdGenerator, Message};

pub use channels::{ChannelFactory, SharedStageReceiver, StageReceiver, StageSender};
pub use compress::Compressor;
pub use decompress::Decompressor;
pub use deduplicate::{dedup_window, DedupOutcome, Deduplicator};
pub use shutdown::{wait_for_shutdown_signal, ShutdownSignal};
pub use window::{collect_window, BatchWindowConfig, Window};

/// Optional transform stage. The derived ordering is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Decompress,
    Deduplicate,
    Compress,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Decompress => "decompress",
            StageKind::Deduplicate => "deduplicate",
            StageKind::Compress => "compress",
        }
    }

    /// Whether the stage accumulates batch windows
    pub fn is_windowed(&self) -> bool {
        !matches!(self, StageKind::Decompress)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplicated set of stages, iterated in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSet(BTreeSet<StageKind>);

impl StageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the stage was already present
    pub fn insert(&mut self, kind: StageKind) -> bool {
        self.0.insert(kind)
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = StageKind> + '_ {
        self.0.iter().copied()
    }

    pub fn has_windowed_stage(&self) -> bool {
        self.iter().any(|kind| kind.is_windowed())
    }
}

impl FromIterator<StageKind> for StageSet {
    fn from_iter<I: IntoIterator<Item = StageKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The shape of a consumer's pipeline, fixed at build time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineTopology {
    pub stages: StageSet,
    pub fetch_workers: usize,
    pub delivery_workers: usize,
    pub channel_capacity: usize,
    /// Present only when a windowed stage is configured
    pub batch_window: Option<BatchWindowConfig>,
}

impl PipelineTopology {
    /// Stages in execution order
    pub fn stages(&self) -> Vec<StageKind> {
        self.stages.iter().collect()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn has_stage(&self, kind: StageKind) -> bool {
        self.stages.contains(kind)
    }

    /// Fetch output feeds delivery directly
    pub fn is_direct(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Transforms supplied at build time. Presence decides the topology.
#[derive(Clone, Default)]
pub(crate) struct StageTransforms {
    pub decompress: Option<Arc<dyn Decompressor>>,
    pub deduplicate: Option<Arc<dyn Deduplicator>>,
    pub compress: Option<Arc<dyn Compressor>>,
}

impl StageTransforms {
    pub fn stage_set(&self) -> StageSet {
        let mut set = StageSet::new();
        if self.decompress.is_some() {
            set.insert(StageKind::Decompress);
        }
        if self.deduplicate.is_some() {
            set.insert(StageKind::Deduplicate);
        }
        if self.compress.is_some() {
            set.insert(StageKind::Compress);
        }
        set
    }
}

impl fmt::Debug for StageTransforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageTransforms")
            .field("stages", &self.stage_set())
            .finish()
    }
}

/// Shared state every stage task needs
#[derive(Clone)]
pub(crate) struct StageContext {
    pub topic: Arc<str>,
    pub id_generator: Arc<dyn IdGenerator>,
    pub stats: Arc<ConsumerStats>,
}

impl StageContext {
    /// Assign a generated id to a message that has none
    pub fn ensure_id(&self, message: &mut Message) {
        if !message.has_id() {
            message.assign_id(self.id_generator.create());
        }
    }

    /// Forward every message in order. Returns false once downstream is gone.
    pub async fn forward_all(&self, output: &StageSender, messages: Vec<Message>) -> bool {
        for mut message in messages {
            self.ensure_id(&mut message);
            if output.send(message).await.is_err() {
                return false;
            }
        }
        true
    }

    #[cfg(test)]
    pub fn for_tests(topic: &str) -> Self {
        Self {
            topic: Arc::from(topic),
            id_generator: Arc::new(crate::messaging::UuidV7Generator),
            stats: Arc::new(ConsumerStats::default()),
        }
    }
}

/// Spawn the configured stages into `tasks`
///
/// Returns the sender the fetch workers write into and the receiver the
/// delivery workers read from. With no stage configured both ends belong to
/// the same channel.
pub(crate) fn assemble(
    ctx: &StageContext,
    transforms: &StageTransforms,
    window: BatchWindowConfig,
    capacity: usize,
    tasks: &mut JoinSet<Result<(), ConsumerError>>,
) -> (StageSender, StageReceiver) {
    let (head_tx, mut upstream) = ChannelFactory::stage_channel(capacity);

    for kind in transforms.stage_set().iter() {
        let (tx, rx) = ChannelFactory::stage_channel(capacity);
        let input = std::mem::replace(&mut upstream, rx);
        let stage_ctx = ctx.clone();

        match kind {
            StageKind::Decompress => {
                if let Some(decompressor) = transforms.decompress.clone() {
                    tasks.spawn(async move {
                        decompress::run_decompress_stage(stage_ctx, decompressor, input, tx).await;
                        Ok(())
                    });
                }
            }
            StageKind::Deduplicate => {
                if let Some(deduplicator) = transforms.deduplicate.clone() {
                    tasks.spawn(async move {
                        deduplicate::run_deduplicate_stage(stage_ctx, deduplicator, input, tx, window)
                            .await;
                        Ok(())
                    });
                }
            }
            StageKind::Compress => {
                if let Some(compressor) = transforms.compress.clone() {
                    tasks.spawn(async move {
                        compress::run_compress_stage(stage_ctx, compressor, input, tx, window).await;
                        Ok(())
                    });
                }
            }
        }

        log_pipeline_operation("assemble", &ctx.topic, Some(kind.as_str()), "spawned", None);
    }

    (head_tx, upstream)
}
