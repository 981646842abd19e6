//! Per-item outcomes and the aggregate batch report.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stage of the item pipeline where a fault surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for a concurrency slot, or the task itself died
    Scheduling,

    /// Transcript generation
    Transcribe,

    /// Article generation
    Summarize,

    /// Removing the entry from the queue
    Dequeue,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Scheduling => write!(f, "scheduling"),
            Stage::Transcribe => write!(f, "transcribe"),
            Stage::Summarize => write!(f, "summarize"),
            Stage::Dequeue => write!(f, "dequeue"),
        }
    }
}

/// Result of running one entry through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Note written; `dequeued` is false when deletion is disabled
    Completed { note_path: PathBuf, dequeued: bool },

    /// Transcription produced no text
    TranscriptionFailed,

    /// Article generation produced no text
    ArticleFailed,

    /// The note could not be written
    PersistFailed { error: String },

    /// A collaborator call failed unexpectedly
    Fault { stage: Stage, error: String },
}

impl PipelineOutcome {
    /// Collapse to the boolean success flag
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Build a fault outcome from any error
    pub fn fault(stage: Stage, error: impl fmt::Display) -> Self {
        Self::Fault {
            stage,
            error: error.to_string(),
        }
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { note_path, dequeued } => write!(
                f,
                "completed ({}, dequeued: {})",
                note_path.display(),
                dequeued
            ),
            Self::TranscriptionFailed => write!(f, "transcription returned no text"),
            Self::ArticleFailed => write!(f, "article generation returned no text"),
            Self::PersistFailed { error } => write!(f, "note could not be written: {}", error),
            Self::Fault { stage, error } => write!(f, "fault during {}: {}", stage, error),
        }
    }
}

/// What happened to the archive step at the end of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relocation {
    /// No destination archive is configured
    NotConfigured,

    /// Nothing succeeded, so nothing was moved
    Skipped,

    /// Relocation ran and moved this many notes
    Moved(usize),
}

/// Aggregate result of one batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Identifier used to correlate log lines for this batch
    pub run_id: Uuid,

    /// Entries fetched from the queue
    pub total: usize,

    /// Pipelines that completed
    pub succeeded: usize,

    /// Pipelines that failed for any reason
    pub failed: usize,

    /// Archive step result
    pub relocation: Relocation,
}

impl BatchReport {
    /// Report for a batch with nothing to process
    pub fn empty(run_id: Uuid) -> Self {
        Self {
            run_id,
            total: 0,
            succeeded: 0,
            failed: 0,
            relocation: Relocation::Skipped,
        }
    }

    /// Tally outcomes; order does not matter
    pub fn from_outcomes<'a, I>(run_id: Uuid, outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a PipelineOutcome>,
    {
        let mut report = Self::empty(run_id);
        for outcome in outcomes {
            report.total += 1;
            if outcome.is_success() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(name: &str) -> PipelineOutcome {
        PipelineOutcome::Completed {
            note_path: PathBuf::from(name),
            dequeued: true,
        }
    }

    #[test]
    fn test_only_completed_is_success() {
        assert!(completed("a.md").is_success());
        assert!(!PipelineOutcome::TranscriptionFailed.is_success());
        assert!(!PipelineOutcome::ArticleFailed.is_success());
        assert!(!PipelineOutcome::PersistFailed {
            error: "disk full".to_string()
        }
        .is_success());
        assert!(!PipelineOutcome::fault(Stage::Dequeue, "403").is_success());
    }

    #[test]
    fn test_report_ignores_completion_order() {
        let run_id = Uuid::new_v4();
        let a = vec![
            completed("a.md"),
            PipelineOutcome::ArticleFailed,
            completed("b.md"),
        ];
        let mut b = a.clone();
        b.reverse();

        assert_eq!(
            BatchReport::from_outcomes(run_id, &a),
            BatchReport::from_outcomes(run_id, &b)
        );
        let report = BatchReport::from_outcomes(run_id, &a);
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_fault_display_names_stage() {
        let outcome = PipelineOutcome::fault(Stage::Transcribe, "connection reset");
        assert_eq!(
            outcome.to_string(),
            "fault during transcribe: connection reset"
        );
    }
}
