//! YouTube playlist used as the work queue.
//!
//! Talks to the YouTube Data API v3 directly over HTTP:
//! - `playlistItems.list` pages through the queue (50 items per page)
//! - `videos.list` fills in title, channel and publish time per page
//! - `playlistItems.delete` removes a processed entry

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::{GatewayError, QueueGateway, TokenStore};
use crate::domain::QueueEntry;

/// Production API root
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Maximum page size accepted by `playlistItems.list`
const PAGE_SIZE: u32 = 50;

const SERVICE: &str = "YouTube";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    id: String,
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: String,
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

/// Queue gateway backed by a YouTube playlist
pub struct YouTubeQueue {
    playlist_id: String,
    /// When false, `remove` is a logged no-op
    delete_enabled: bool,
    base_url: String,
    client: reqwest::Client,
    tokens: TokenStore,
}

impl YouTubeQueue {
    /// Create a gateway for a playlist
    pub fn new(playlist_id: impl Into<String>, delete_enabled: bool, tokens: TokenStore) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            delete_enabled,
            base_url: YOUTUBE_API_BASE.to_string(),
            client: reqwest::Client::new(),
            tokens,
        }
    }

    /// Point the gateway at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build API URL
    fn api_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    /// Authenticated GET returning parsed JSON
    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(self.api_url(resource))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::api(SERVICE, status, &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch one page of playlist items
    async fn fetch_page(&self, page_token: Option<&str>) -> Result<PlaylistItemsPage, GatewayError> {
        let page_size = PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", self.playlist_id.as_str()),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        self.get_json("playlistItems", &query).await
    }

    /// Fetch video snippets for a batch of ids
    async fn fetch_videos(&self, ids: &[&str]) -> Result<HashMap<String, VideoSnippet>, GatewayError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let joined = ids.join(",");
        let videos: VideoList = self
            .get_json("videos", &[("part", "snippet"), ("id", joined.as_str())])
            .await?;

        Ok(videos
            .items
            .into_iter()
            .map(|video| (video.id, video.snippet))
            .collect())
    }
}

#[async_trait]
impl QueueGateway for YouTubeQueue {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn list_entries(&self) -> Result<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;

            let ids: Vec<&str> = page
                .items
                .iter()
                .map(|item| item.content_details.video_id.as_str())
                .collect();
            let mut videos = self.fetch_videos(&ids).await?;

            for item in &page.items {
                let video_id = &item.content_details.video_id;
                let Some(snippet) = videos.remove(video_id) else {
                    // Deleted or private videos have no details
                    debug!(%video_id, "No video details, skipping playlist item");
                    continue;
                };

                entries.push(QueueEntry::new(
                    item.id.clone(),
                    video_id.clone(),
                    snippet.title,
                    snippet.channel_title.unwrap_or_else(|| "Unknown".to_string()),
                    snippet.published_at.filter(|p| !p.is_empty()),
                ));
            }

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        info!(count = entries.len(), playlist = %self.playlist_id, "Fetched playlist entries");
        Ok(entries)
    }

    async fn remove(&self, item_id: &str) -> Result<bool> {
        if !self.delete_enabled {
            info!(%item_id, "Playlist deletion disabled, leaving entry in place");
            return Ok(false);
        }

        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .delete(self.api_url("playlistItems"))
            .bearer_auth(token)
            .query(&[("id", item_id)])
            .send()
            .await
            .map_err(GatewayError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::api(SERVICE, status, &body).into());
        }

        info!(%item_id, "Removed entry from playlist");
        Ok(true)
    }
}
