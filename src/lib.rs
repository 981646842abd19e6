//! vidnotes - Turn a YouTube playlist into Markdown notes
//!
//! Each video queued in a playlist is transcribed and summarized by Gemini,
//! written as a Markdown note, removed from the playlist and finally moved
//! into an Obsidian vault.
//!
//! # Architecture
//!
//! - Every entry runs through the same fixed pipeline:
//!   transcribe, summarize, persist, dequeue
//! - Pipelines run concurrently behind a semaphore sized by `max_concurrent`
//! - Per-entry failures are typed outcomes, never errors; only a failure to
//!   read the queue aborts the batch
//!
//! # Modules
//!
//! - `adapters`: External systems (YouTube playlist, Gemini, OAuth token)
//! - `core`: Processing logic (ItemPipeline, BatchOrchestrator)
//! - `domain`: Data structures (QueueEntry, PipelineOutcome, BatchReport)
//! - `library`: Note files (NoteWriter, archive relocation)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process the whole playlist
//! vidnotes
//!
//! # See what is queued
//! vidnotes list
//!
//! # Move staged notes into the vault
//! vidnotes archive
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;
pub mod logging;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{BatchOrchestrator, ItemPipeline};
pub use domain::{BatchReport, PipelineOutcome, QueueEntry, Relocation, Stage};
pub use library::NoteWriter;
