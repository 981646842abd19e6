//! Persisted OAuth credentials for the YouTube Data API.
//!
//! Reads a Google authorized-user token file (`token.json`), refreshes the
//! access token with the stored refresh token when it has expired, and
//! writes the refreshed token back so the next run starts warm.
//!
//! The interactive first-time consent flow is not handled here; the token
//! file has to exist already.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::GatewayError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry
const EXPIRY_SKEW_SECONDS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Authorized-user token as persisted on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Current access token
    #[serde(default)]
    pub token: Option<String>,

    pub refresh_token: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    pub client_id: Option<String>,

    pub client_secret: Option<String>,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the access token stops being valid
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,

    /// Fields we do not interpret but must write back untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OAuthToken {
    /// Whether the access token must be refreshed before use
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(t), _) if t.is_empty() => true,
            (Some(_), Some(expiry)) => now + Duration::seconds(EXPIRY_SKEW_SECONDS) >= expiry,
            (Some(_), None) => false,
        }
    }
}

/// Response of the token endpoint for a refresh grant
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Loads, refreshes and persists the token; shared by concurrent callers
pub struct TokenStore {
    path: PathBuf,
    client: reqwest::Client,
    cached: Mutex<Option<OAuthToken>>,
}

impl TokenStore {
    /// Create a store backed by the given token file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Path of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a valid access token, refreshing it if needed.
    ///
    /// Callers serialize on the cache lock, so concurrent pipelines trigger
    /// at most one refresh.
    pub async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.cached.lock().await;

        let mut token = match cached.take() {
            Some(token) => token,
            None => self.load().await?,
        };

        if token.needs_refresh(Utc::now()) {
            token = self.refresh(token).await?;
            self.save(&token).await?;
        }

        let access = token.token.clone().unwrap_or_default();
        *cached = Some(token);
        Ok(access)
    }

    /// Read the token file
    async fn load(&self) -> Result<OAuthToken, GatewayError> {
        if !self.path.exists() {
            return Err(GatewayError::Auth(format!(
                "token file not found: {} (authorize the application once and place the authorized-user token there)",
                self.path.display()
            )));
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let token: OAuthToken = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "Loaded OAuth token");
        Ok(token)
    }

    /// Write the token file
    async fn save(&self, token: &OAuthToken) -> Result<(), GatewayError> {
        let content = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    /// Exchange the refresh token for a new access token
    async fn refresh(&self, mut token: OAuthToken) -> Result<OAuthToken, GatewayError> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| GatewayError::Auth("token has no refresh_token".to_string()))?;
        let client_id = token
            .client_id
            .clone()
            .ok_or_else(|| GatewayError::Auth("token has no client_id".to_string()))?;
        let client_secret = token.client_secret.clone().unwrap_or_default();

        let response = self
            .client
            .post(&token.token_uri)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Auth(format!(
                "token refresh failed ({}): {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let refreshed: RefreshResponse = serde_json::from_str(&body)?;
        token.token = Some(refreshed.access_token);
        token.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(rotated) = refreshed.refresh_token {
            token.refresh_token = Some(rotated);
        }

        info!("Refreshed OAuth access token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn token_json(token_uri: &str, expiry: &str) -> String {
        serde_json::json!({
            "token": "stale-token",
            "refresh_token": "refresh-me",
            "token_uri": token_uri,
            "client_id": "client-1",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/youtube"],
            "expiry": expiry,
            "universe_domain": "googleapis.com"
        })
        .to_string()
    }

    #[test]
    fn test_needs_refresh() {
        let now = Utc::now();
        let mut token: OAuthToken =
            serde_json::from_str(&token_json(DEFAULT_TOKEN_URI, "2000-01-01T00:00:00Z")).unwrap();
        assert!(token.needs_refresh(now));

        token.expiry = Some(now + Duration::hours(1));
        assert!(!token.needs_refresh(now));

        // Inside the skew window
        token.expiry = Some(now + Duration::seconds(30));
        assert!(token.needs_refresh(now));

        token.token = None;
        token.expiry = None;
        assert!(token.needs_refresh(now));
    }

    #[tokio::test]
    async fn test_missing_token_file_is_auth_error() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        let err = store.access_token().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
    }

    #[tokio::test]
    async fn test_valid_token_is_used_without_refresh() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        let expiry = (Utc::now() + Duration::hours(1)).to_rfc3339();
        std::fs::write(&path, token_json("http://127.0.0.1:1/token", &expiry)).unwrap();

        let store = TokenStore::new(&path);
        assert_eq!(store.access_token().await.unwrap(), "stale-token");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(serde_json::json!({
                    "access_token": "fresh-token",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }));
            })
            .await;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        std::fs::write(&path, token_json(&server.url("/token"), "2000-01-01T00:00:00Z")).unwrap();

        let store = TokenStore::new(&path);
        assert_eq!(store.access_token().await.unwrap(), "fresh-token");
        // Second call is served from the cache
        assert_eq!(store.access_token().await.unwrap(), "fresh-token");
        mock.assert_hits_async(1).await;

        let saved: OAuthToken =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.token.as_deref(), Some("fresh-token"));
        assert!(saved.expiry.unwrap() > Utc::now());
        assert_eq!(
            saved.extra.get("universe_domain").and_then(|v| v.as_str()),
            Some("googleapis.com")
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).body(r#"{"error": "invalid_grant"}"#);
            })
            .await;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        std::fs::write(&path, token_json(&server.url("/token"), "2000-01-01T00:00:00Z")).unwrap();

        let err = TokenStore::new(&path).access_token().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth(ref msg) if msg.contains("invalid_grant")));
    }
}
