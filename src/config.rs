//! Configuration for vidnotes.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line overrides (applied by the CLI after loading)
//! 2. Environment variables (PLAYLIST_ID, GEMINI_API_KEY, ...), including `.env`
//! 3. Config file (.vidnotes/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .vidnotes/config.yaml
//! - Paths in config file are relative to the directory containing `.vidnotes/`
//!
//! The result is one explicit [`Config`] value that is passed to the gateways
//! and the orchestrator. Nothing in the pipeline reads the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

/// Default number of pipelines allowed in flight at once
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default staging directory for freshly written notes
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default location of the persisted OAuth token
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

/// Default directory for run logs
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const DEFAULT_TRANSCRIBE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ARTICLE_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_ARTICLE_LANGUAGE: &str = "Japanese";

/// Errors raised while resolving or validating configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("max_concurrent must be at least 1")]
    ZeroConcurrency,

    #[error("{0} is not set (environment variable or config file)")]
    Missing(&'static str),
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    pub max_concurrent: Option<usize>,
    pub debug: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistConfig {
    pub id: Option<String>,
    /// Remove processed entries from the playlist
    pub delete_processed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub transcribe_model: Option<String>,
    pub article_model: Option<String>,
    /// Language the article is written in
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Staging directory for notes (relative to project root)
    pub output: Option<String>,
    /// Archive the notes are moved into after a batch
    pub vault: Option<String>,
    /// Persisted OAuth token
    pub token: Option<String>,
    /// Log file directory
    pub logs: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Playlist used as the work queue
    pub playlist_id: String,
    /// Whether processed entries are removed from the playlist
    pub delete_from_playlist: bool,
    /// Generation provider credential
    pub gemini_api_key: String,
    pub transcribe_model: String,
    pub article_model: String,
    pub article_language: String,
    /// Verbose logging
    pub debug: bool,
    /// Archive directory; `None` disables relocation
    pub vault_path: Option<PathBuf>,
    /// Maximum pipelines in flight
    pub max_concurrent: usize,
    /// Staging directory notes are written to
    pub output_dir: PathBuf,
    /// Persisted OAuth token file
    pub token_path: PathBuf,
    /// Directory for run logs
    pub log_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playlist_id: String::new(),
            delete_from_playlist: false,
            gemini_api_key: String::new(),
            transcribe_model: DEFAULT_TRANSCRIBE_MODEL.to_string(),
            article_model: DEFAULT_ARTICLE_MODEL.to_string(),
            article_language: DEFAULT_ARTICLE_LANGUAGE.to_string(),
            debug: false,
            vault_path: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            config_file: None,
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and the config file.
    ///
    /// `explicit` bypasses config file discovery.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();

        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };

        let file = match config_path {
            Some(ref path) => Some((load_config_file(path)?, path.clone())),
            None => None,
        };

        let config = Self::resolve(file, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Merge a parsed config file with environment lookups.
    ///
    /// `env` returns the value of an environment variable; empty values count
    /// as unset.
    pub fn resolve<F>(file: Option<(ConfigFile, PathBuf)>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some((file, path)) = file {
            // Base directory is the parent of .vidnotes/ (i.e., grandparent of config.yaml)
            let base_dir = path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(Path::new("."))
                .to_path_buf();

            if let Some(id) = file.playlist.id {
                config.playlist_id = id;
            }
            if let Some(delete) = file.playlist.delete_processed {
                config.delete_from_playlist = delete;
            }
            if let Some(key) = file.gemini.api_key {
                config.gemini_api_key = key;
            }
            if let Some(model) = file.gemini.transcribe_model {
                config.transcribe_model = model;
            }
            if let Some(model) = file.gemini.article_model {
                config.article_model = model;
            }
            if let Some(language) = file.gemini.language {
                config.article_language = language;
            }
            if let Some(debug) = file.debug {
                config.debug = debug;
            }
            if let Some(max) = file.max_concurrent {
                config.max_concurrent = max;
            }
            if let Some(ref output) = file.paths.output {
                config.output_dir = resolve_path(&base_dir, output);
            }
            if let Some(ref vault) = file.paths.vault {
                if !vault.trim().is_empty() {
                    config.vault_path = Some(resolve_path(&base_dir, vault));
                }
            }
            if let Some(ref token) = file.paths.token {
                config.token_path = resolve_path(&base_dir, token);
            }
            if let Some(ref logs) = file.paths.logs {
                config.log_dir = resolve_path(&base_dir, logs);
            }
            config.config_file = Some(path);
        }

        if let Some(id) = lookup("PLAYLIST_ID") {
            config.playlist_id = id;
        }
        if let Some(value) = lookup("DELETE_FROM_PLAYLIST") {
            config.delete_from_playlist = parse_flag(&value);
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            config.gemini_api_key = key;
        }
        if let Some(value) = lookup("DEBUG_MODE") {
            config.debug = parse_flag(&value);
        }
        if let Some(vault) = lookup("OBSIDIAN_VAULT_PATH") {
            config.vault_path = Some(expand_home(&vault));
        }
        if let Some(value) = lookup("MAX_CONCURRENT") {
            config.max_concurrent =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber {
                        key: "MAX_CONCURRENT",
                        value: value.clone(),
                    })?;
        }
        if let Some(output) = lookup("VIDNOTES_OUTPUT_DIR") {
            config.output_dir = expand_home(&output);
        }
        if let Some(token) = lookup("VIDNOTES_TOKEN_PATH") {
            config.token_path = expand_home(&token);
        }

        if config.max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(config)
    }

    /// Ensure everything needed to talk to the playlist is present
    pub fn require_playlist(&self) -> Result<(), ConfigError> {
        if self.playlist_id.trim().is_empty() {
            return Err(ConfigError::Missing("PLAYLIST_ID"));
        }
        Ok(())
    }

    /// Ensure everything needed to run a batch is present
    pub fn require_batch(&self) -> Result<(), ConfigError> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("GEMINI_API_KEY"));
        }
        self.require_playlist()
    }

    /// API key with all but the last four characters hidden
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.gemini_api_key.chars().collect();
        if chars.is_empty() {
            return "(not set)".to_string();
        }
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

/// Truthy only for a case-insensitive "true"
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".vidnotes").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Expand a leading `~/` to the home directory
fn expand_home(path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path_str)
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = expand_home(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = Config::resolve(None, env_from(&[])).unwrap();

        assert_eq!(config.max_concurrent, 3);
        assert!(!config.delete_from_playlist);
        assert!(!config.debug);
        assert!(config.vault_path.is_none());
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.token_path, PathBuf::from("token.json"));
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_env_values() {
        let config = Config::resolve(
            None,
            env_from(&[
                ("PLAYLIST_ID", "PL123"),
                ("DELETE_FROM_PLAYLIST", "TRUE"),
                ("GEMINI_API_KEY", "secret-key"),
                ("DEBUG_MODE", "yes"),
                ("OBSIDIAN_VAULT_PATH", "/vault/inbox"),
                ("MAX_CONCURRENT", "5"),
            ]),
        )
        .unwrap();

        assert_eq!(config.playlist_id, "PL123");
        assert!(config.delete_from_playlist);
        assert_eq!(config.gemini_api_key, "secret-key");
        // Only "true" counts as true
        assert!(!config.debug);
        assert_eq!(config.vault_path, Some(PathBuf::from("/vault/inbox")));
        assert_eq!(config.max_concurrent, 5);
    }

    #[test]
    fn test_empty_vault_disables_relocation() {
        let config =
            Config::resolve(None, env_from(&[("OBSIDIAN_VAULT_PATH", "")])).unwrap();
        assert!(config.vault_path.is_none());
    }

    #[test]
    fn test_invalid_concurrency_rejected() {
        let err = Config::resolve(None, env_from(&[("MAX_CONCURRENT", "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                key: "MAX_CONCURRENT",
                value: "many".to_string()
            }
        );

        let err = Config::resolve(None, env_from(&[("MAX_CONCURRENT", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroConcurrency);
    }

    #[test]
    fn test_config_file_parsing_and_env_precedence() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".vidnotes");
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
playlist:
  id: PL-from-file
  delete_processed: true
gemini:
  api_key: file-key
  language: English
paths:
  output: staging
  vault: /archive
max_concurrent: 2
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, Some("1.0".to_string()));
        assert_eq!(parsed.playlist.id, Some("PL-from-file".to_string()));

        let config = Config::resolve(
            Some((parsed, config_path.clone())),
            env_from(&[("PLAYLIST_ID", "PL-from-env")]),
        )
        .unwrap();

        assert_eq!(config.playlist_id, "PL-from-env");
        assert!(config.delete_from_playlist);
        assert_eq!(config.gemini_api_key, "file-key");
        assert_eq!(config.article_language, "English");
        assert_eq!(config.output_dir, temp.path().join("staging"));
        assert_eq!(config.vault_path, Some(PathBuf::from("/archive")));
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_required_values() {
        let config = Config::default();
        assert_eq!(
            config.require_batch(),
            Err(ConfigError::Missing("GEMINI_API_KEY"))
        );

        let config = Config {
            gemini_api_key: "k".to_string(),
            ..Default::default()
        };
        assert_eq!(config.require_batch(), Err(ConfigError::Missing("PLAYLIST_ID")));
    }

    #[test]
    fn test_masked_api_key() {
        let config = Config {
            gemini_api_key: "abcdefgh1234".to_string(),
            ..Default::default()
        };
        assert_eq!(config.masked_api_key(), "********1234");
        assert_eq!(Config::default().masked_api_key(), "(not set)");
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
