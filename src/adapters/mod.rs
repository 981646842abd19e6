//! Adapter interfaces for external systems.
//!
//! The pipeline only talks to the outside world through two traits:
//! [`QueueGateway`] (the playlist acting as a work queue) and
//! [`GenerationGateway`] (the model producing transcripts and articles).
//! Concrete implementations live in the submodules.

pub mod gemini;
pub mod oauth;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::QueueEntry;

pub use gemini::GeminiClient;
pub use oauth::{OAuthToken, TokenStore};
pub use youtube::YouTubeQueue;

/// Errors surfaced by the HTTP adapters
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Google-style error envelope: `{"error": {"message": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GatewayError {
    /// Build an API error from a non-success response body
    pub(crate) fn api(service: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        Self::Api {
            service,
            status: status.as_u16(),
            message,
        }
    }
}

/// The remote queue of pending entries
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// Human-readable gateway name
    fn name(&self) -> &str;

    /// Enumerate every pending entry, in queue order
    async fn list_entries(&self) -> Result<Vec<QueueEntry>>;

    /// Remove one entry by its queue-item id.
    ///
    /// Returns `Ok(false)` when deletion is disabled by configuration.
    async fn remove(&self, item_id: &str) -> Result<bool>;
}

/// The text-generation provider
///
/// An empty string is the "no text generated" result; `Err` is reserved for
/// unexpected failures such as transport or API errors.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Human-readable gateway name
    fn name(&self) -> &str;

    /// Produce a transcript for the media at `media_ref`
    async fn transcribe(&self, media_ref: &str) -> Result<String>;

    /// Produce a summary article from a transcript
    async fn summarize(&self, transcript: &str) -> Result<String>;
}
