//! Queue entries awaiting processing.
//!
//! An entry is produced by a queue gateway and stays immutable for the
//! lifetime of one batch run.

use serde::{Deserialize, Serialize};

/// Base URL for canonical watch links
const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// One video waiting in the upstream queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Queue-membership id (required to remove the entry)
    pub item_id: String,

    /// Content id of the video itself
    pub video_id: String,

    /// Locator handed to the generation provider
    pub url: String,

    /// Human-readable title
    pub title: String,

    /// Channel the video was published on
    pub channel: String,

    /// Publication time as reported upstream (ISO-8601)
    #[serde(default)]
    pub published_at: Option<String>,
}

impl QueueEntry {
    /// Create an entry whose URL is derived from the video id
    pub fn new(
        item_id: impl Into<String>,
        video_id: impl Into<String>,
        title: impl Into<String>,
        channel: impl Into<String>,
        published_at: Option<String>,
    ) -> Self {
        let video_id = video_id.into();
        Self {
            item_id: item_id.into(),
            url: Self::watch_url(&video_id),
            video_id,
            title: title.into(),
            channel: channel.into(),
            published_at,
        }
    }

    /// Canonical watch URL for a video id
    pub fn watch_url(video_id: &str) -> String {
        format!("{}{}", WATCH_URL_BASE, video_id)
    }

    /// Video id used for the embedded player.
    ///
    /// Falls back to parsing `url` when the entry carries no explicit id.
    pub fn embed_id(&self) -> Option<String> {
        let id = self.video_id.trim();
        if !id.is_empty() {
            return Some(id.to_string());
        }
        video_id_from_url(&self.url)
    }
}

/// Extract a video id from `watch?v=` or `youtu.be/` style URLs
pub fn video_id_from_url(url: &str) -> Option<String> {
    let id = if let Some((_, rest)) = url.split_once("watch?v=") {
        rest.split('&').next()
    } else if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest.split('?').next()
    } else {
        None
    }?;

    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
