//! Core processing logic.
//!
//! This module contains:
//! - ItemPipeline: the per-entry step sequence
//! - BatchOrchestrator: bounded concurrent execution over the whole queue

pub mod orchestrator;
pub mod pipeline;

// Re-export commonly used types
pub use orchestrator::BatchOrchestrator;
pub use pipeline::ItemPipeline;
