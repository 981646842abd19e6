//! Per-entry processing: transcribe, summarize, persist, dequeue.
//!
//! Steps run strictly in order and stop at the first failure. Nothing is
//! propagated out of [`ItemPipeline::run`]; every failure becomes a
//! [`PipelineOutcome`].

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::adapters::{GenerationGateway, QueueGateway};
use crate::domain::{PipelineOutcome, QueueEntry, Stage};
use crate::library::NoteWriter;

/// Processes one queue entry end to end
#[derive(Clone)]
pub struct ItemPipeline {
    generator: Arc<dyn GenerationGateway>,
    queue: Arc<dyn QueueGateway>,
    writer: NoteWriter,
}

impl ItemPipeline {
    /// Create a pipeline over the given gateways and note writer
    pub fn new(
        generator: Arc<dyn GenerationGateway>,
        queue: Arc<dyn QueueGateway>,
        writer: NoteWriter,
    ) -> Self {
        Self {
            generator,
            queue,
            writer,
        }
    }

    /// Run every step for `entry`; `index` is 1-based within `total`
    pub async fn run(&self, entry: &QueueEntry, index: usize, total: usize) -> PipelineOutcome {
        let outcome = self.process(entry, index, total).await;

        match &outcome {
            PipelineOutcome::Completed { .. } => {
                info!("[{}/{}] Finished: {}", index, total, entry.title);
            }
            PipelineOutcome::TranscriptionFailed | PipelineOutcome::ArticleFailed => {
                warn!("[{}/{}] Skipped: {} ({})", index, total, entry.title, outcome);
            }
            PipelineOutcome::PersistFailed { .. } | PipelineOutcome::Fault { .. } => {
                error!("[{}/{}] Failed: {} ({})", index, total, entry.title, outcome);
            }
        }

        outcome
    }

    async fn process(&self, entry: &QueueEntry, index: usize, total: usize) -> PipelineOutcome {
        info!("[{}/{}] Transcribing: {}", index, total, entry.title);
        let transcript = match self.generator.transcribe(&entry.url).await {
            Ok(text) if text.is_empty() => return PipelineOutcome::TranscriptionFailed,
            Ok(text) => text,
            Err(e) => return PipelineOutcome::fault(Stage::Transcribe, format!("{:#}", e)),
        };

        info!("[{}/{}] Writing article: {}", index, total, entry.title);
        let article = match self.generator.summarize(&transcript).await {
            Ok(text) if text.is_empty() => return PipelineOutcome::ArticleFailed,
            Ok(text) => text,
            Err(e) => return PipelineOutcome::fault(Stage::Summarize, format!("{:#}", e)),
        };

        let note_path = match self.writer.persist(entry, &transcript, &article).await {
            Ok(path) => path,
            Err(e) => {
                return PipelineOutcome::PersistFailed {
                    error: format!("{:#}", e),
                }
            }
        };

        // The note stays in staging even if this fails; the entry is retried next run
        let dequeued = match self.queue.remove(&entry.item_id).await {
            Ok(removed) => removed,
            Err(e) => return PipelineOutcome::fault(Stage::Dequeue, format!("{:#}", e)),
        };

        PipelineOutcome::Completed {
            note_path,
            dequeued,
        }
    }
}
