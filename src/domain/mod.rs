//! Domain types for the note pipeline.
//!
//! This module contains the core data structures:
//! - QueueEntry: A video waiting in the upstream queue
//! - PipelineOutcome: What happened to one entry
//! - BatchReport: Aggregate of one batch run

pub mod entry;
pub mod outcome;

// Re-export commonly used types
pub use entry::{video_id_from_url, QueueEntry};
pub use outcome::{BatchReport, PipelineOutcome, Relocation, Stage};
