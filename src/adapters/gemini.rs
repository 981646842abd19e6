//! Gemini adapter for transcripts and articles.
//!
//! Calls the Generative Language `generateContent` endpoint. Transcription
//! passes the video URL as a `fileData` part so the model reads the media
//! directly; article generation sends the transcript as plain text.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{GatewayError, GenerationGateway};
use crate::config::Config;

/// Production API root
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generation on long videos routinely takes minutes
const REQUEST_TIMEOUT: Duration = Duration::from_secs(900);

const TRANSCRIBE_INSTRUCTION: &str = "Transcribe this video.";

const SERVICE: &str = "Gemini";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate (empty if none)
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Build the article instruction followed by the transcript
pub fn article_prompt(language: &str, transcript: &str) -> String {
    format!(
        "Please execute the following workflow:\n\
         1. Create a summary article based on the transcript provided below.\n\
         2. Extract keywords from the article and add them as hashtags at the bottom.\n\
         \n\
         - Create the article in {language}.\n\
         - Create the article in markdown format.\n\
         - Focus on key points and include as much information as possible.\n\
         - **Important**: Output only the article. No additional explanatory text is needed.\n\
         - Hashtags start with \"#\" and multiple hashtags can be specified separated by half-width spaces.\n\
         - Please note that including \".\" after \"#\" will prevent recognition as hashtags.\n\
         - Select main keywords for hashtags to summarize the content of the file.\n\
         - Use company names, product names, service names, specific person names, and specific technical terms mentioned in the article as hashtags.\n\
         \n\
         ====Transcript below====\n\
         {transcript}\n"
    )
}

/// First few characters of generated text for debug logs
fn preview(text: &str) -> String {
    text.chars().take(20).collect()
}

/// Gemini-backed generation gateway
pub struct GeminiClient {
    api_key: String,
    transcribe_model: String,
    article_model: String,
    language: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client with explicit models
    pub fn new(
        api_key: impl Into<String>,
        transcribe_model: impl Into<String>,
        article_model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.into(),
            transcribe_model: transcribe_model.into(),
            article_model: article_model.into(),
            language: language.into(),
            base_url: GEMINI_API_BASE.to_string(),
            client,
        }
    }

    /// Create from resolved configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gemini_api_key.clone(),
            config.transcribe_model.clone(),
            config.article_model.clone(),
            config.article_language.clone(),
        )
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build API URL
    fn api_url(&self, model: &str) -> String {
        let model = model.trim_start_matches("models/");
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Call `generateContent` and return the response text
    async fn generate(&self, model: &str, body: Value) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.api_url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::api(SERVICE, status, &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)?;
        Ok(parsed.text())
    }
}

#[async_trait]
impl GenerationGateway for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn transcribe(&self, media_ref: &str) -> Result<String> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "fileData": { "fileUri": media_ref } },
                    { "text": TRANSCRIBE_INSTRUCTION }
                ]
            }]
        });

        let text = self.generate(&self.transcribe_model, body).await?;
        if text.is_empty() {
            error!(%media_ref, "No transcript was generated");
        } else {
            debug!(preview = %preview(&text), "Transcript generated");
        }
        Ok(text)
    }

    async fn summarize(&self, transcript: &str) -> Result<String> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": article_prompt(&self.language, transcript) }]
            }]
        });

        let text = self.generate(&self.article_model, body).await?;
        if text.is_empty() {
            error!("No article was generated");
        } else {
            debug!(preview = %preview(&text), "Article generated");
        }
        Ok(text)
    }
}
