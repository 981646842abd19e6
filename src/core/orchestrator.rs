//! Batch orchestrator.
//!
//! Fetches the queue once, runs one [`ItemPipeline`] per entry with at most
//! `max_concurrent` in flight, tallies the outcomes and finally moves the
//! written notes into the archive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{GenerationGateway, QueueGateway};
use crate::config::Config;
use crate::domain::{BatchReport, PipelineOutcome, Relocation, Stage};
use crate::library::{archive, NoteWriter};

use super::pipeline::ItemPipeline;

/// Runs a whole batch over the queue
pub struct BatchOrchestrator {
    queue: Arc<dyn QueueGateway>,
    pipeline: ItemPipeline,
    /// Upper bound on pipelines running at once
    max_concurrent: usize,
    /// Staging directory notes are written to
    output_dir: PathBuf,
    /// Archive destination; `None` disables relocation
    vault_path: Option<PathBuf>,
}

impl BatchOrchestrator {
    /// Create an orchestrator from gateways and resolved configuration
    pub fn new(
        queue: Arc<dyn QueueGateway>,
        generator: Arc<dyn GenerationGateway>,
        config: &Config,
    ) -> Self {
        let writer = NoteWriter::new(config.output_dir.clone());
        Self {
            pipeline: ItemPipeline::new(generator, queue.clone(), writer),
            queue,
            max_concurrent: config.max_concurrent.max(1),
            output_dir: config.output_dir.clone(),
            vault_path: config.vault_path.clone(),
        }
    }

    /// Process every queued entry, then relocate the notes.
    ///
    /// Only a failure to enumerate the queue is returned as an error;
    /// per-entry failures are counted in the report.
    #[instrument(skip(self), fields(queue = %self.queue.name(), max_concurrent = self.max_concurrent))]
    pub async fn run_all(&self) -> Result<BatchReport> {
        let run_id = Uuid::new_v4();

        let entries = self
            .queue
            .list_entries()
            .await
            .context("Failed to fetch queue entries")?;

        if entries.is_empty() {
            info!(%run_id, "No entries to process");
            return Ok(BatchReport::empty(run_id));
        }

        let total = entries.len();
        info!(%run_id, total, "Starting batch");

        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (idx, entry) in entries.into_iter().enumerate() {
            let gate = gate.clone();
            let pipeline = self.pipeline.clone();

            tasks.spawn(async move {
                // Held until the pipeline returns, on every path
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return PipelineOutcome::fault(Stage::Scheduling, e),
                };
                pipeline.run(&entry, idx + 1, total).await
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(%run_id, error = %e, "Pipeline task aborted");
                    outcomes.push(PipelineOutcome::fault(Stage::Scheduling, e));
                }
            }
        }

        let mut report = BatchReport::from_outcomes(run_id, outcomes.iter());
        info!(
            %run_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch finished"
        );

        report.relocation = self.archive(report.succeeded).await;
        Ok(report)
    }

    /// Move staged notes into the archive after a batch
    async fn archive(&self, succeeded: usize) -> Relocation {
        let Some(vault) = &self.vault_path else {
            info!("No archive directory configured, notes stay in staging");
            return Relocation::NotConfigured;
        };

        if succeeded == 0 {
            warn!("No notes were written, skipping archive");
            return Relocation::Skipped;
        }

        let moved = archive::relocate(&self.output_dir, vault).await;
        info!(moved, vault = %vault.display(), "Archived notes");
        if moved > 0 {
            archive::cleanup_empty(&self.output_dir).await;
        }

        Relocation::Moved(moved)
    }
}
