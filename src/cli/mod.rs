//! Command-line interface for vidnotes.
//!
//! Provides commands for running the batch, listing the pending queue,
//! archiving staged notes and showing the resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::adapters::{GeminiClient, QueueGateway, TokenStore, YouTubeQueue};
use crate::config::{Config, ConfigError};
use crate::core::BatchOrchestrator;
use crate::domain::Relocation;
use crate::library::{archive, format_upload_time};
use crate::logging;

/// vidnotes - Turn a YouTube playlist into Markdown notes
#[derive(Parser, Debug)]
#[command(name = "vidnotes")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose logging (same as DEBUG_MODE=true)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file (skips .vidnotes/config.yaml discovery)
    #[arg(long, global = true, env = "VIDNOTES_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every queued video (default)
    Run(RunArgs),

    /// List videos waiting in the playlist
    List,

    /// Move staged notes into the vault
    Archive,

    /// Show the resolved configuration
    Config,
}

/// Overrides for a batch run
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Maximum pipelines running at once
    #[arg(short = 'j', long)]
    pub max_concurrent: Option<usize>,

    /// Staging directory for new notes
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Archive directory notes are moved into afterwards
    #[arg(long)]
    pub vault: Option<PathBuf>,

    /// Leave processed videos in the playlist
    #[arg(long)]
    pub no_delete: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(max) = self.max_concurrent {
            if max == 0 {
                return Err(ConfigError::ZeroConcurrency);
            }
            config.max_concurrent = max;
        }
        if let Some(ref dir) = self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ref vault) = self.vault {
            config.vault_path = Some(vault.clone());
        }
        if self.no_delete {
            config.delete_from_playlist = false;
        }
        Ok(())
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        if self.debug {
            config.debug = true;
        }

        let command = self.command.unwrap_or(Commands::Run(RunArgs::default()));
        if let Commands::Run(ref args) = command {
            args.apply(&mut config)?;
        }

        // Flushes the log file when dropped at the end of the command
        let _guard = logging::init(&config.log_dir, config.debug)?;

        match command {
            Commands::Run(_) => run_batch(&config).await,
            Commands::List => list_entries(&config).await,
            Commands::Archive => archive_notes(&config).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Build the playlist gateway
fn playlist(config: &Config) -> YouTubeQueue {
    YouTubeQueue::new(
        config.playlist_id.clone(),
        config.delete_from_playlist,
        TokenStore::new(config.token_path.clone()),
    )
}

/// Run the full batch
async fn run_batch(config: &Config) -> Result<()> {
    config.require_batch()?;

    let queue = Arc::new(playlist(config));
    let generator = Arc::new(GeminiClient::from_config(config));
    let orchestrator = BatchOrchestrator::new(queue, generator, config);

    let report = orchestrator.run_all().await?;
    if report.total == 0 {
        eprintln!("Nothing to process.");
        return Ok(());
    }

    eprintln!(
        "\n[Batch {}: {} of {} succeeded, {} failed]",
        report.run_id, report.succeeded, report.total, report.failed
    );
    match report.relocation {
        Relocation::Moved(n) => eprintln!("[{} note(s) moved to the vault]", n),
        Relocation::NotConfigured => {
            eprintln!("[Notes left in {}]", config.output_dir.display())
        }
        Relocation::Skipped => {}
    }

    Ok(())
}

/// Print the pending playlist entries
async fn list_entries(config: &Config) -> Result<()> {
    config.require_playlist()?;

    let entries = playlist(config).list_entries().await?;
    if entries.is_empty() {
        println!("Playlist is empty");
        return Ok(());
    }

    println!("{:<4} {:<20} {:<20} {:<50}", "#", "UPLOADED", "CHANNEL", "TITLE");
    println!("{}", "-".repeat(96));

    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:<20} {:<50}",
            i + 1,
            format_upload_time(entry.published_at.as_deref()),
            truncate(&entry.channel, 20),
            truncate(&entry.title, 50)
        );
    }

    println!("\nTotal: {} entries", entries.len());
    Ok(())
}

/// Move whatever is in staging into the vault
async fn archive_notes(config: &Config) -> Result<()> {
    let Some(ref vault) = config.vault_path else {
        bail!(ConfigError::Missing("OBSIDIAN_VAULT_PATH"));
    };

    let moved = archive::relocate(&config.output_dir, vault).await;
    if moved > 0 {
        archive::cleanup_empty(&config.output_dir).await;
    }

    info!(moved, "Archive finished");
    println!("Moved {} note(s) to {}", moved, vault.display());
    Ok(())
}

/// Print the resolved configuration with secrets masked
fn show_config(config: &Config) -> Result<()> {
    let or_unset = |s: &str| {
        if s.is_empty() {
            "(not set)".to_string()
        } else {
            s.to_string()
        }
    };

    println!(
        "Config file:       {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("Playlist:          {}", or_unset(&config.playlist_id));
    println!("Delete processed:  {}", config.delete_from_playlist);
    println!("Gemini API key:    {}", config.masked_api_key());
    println!("Transcribe model:  {}", config.transcribe_model);
    println!("Article model:     {}", config.article_model);
    println!("Article language:  {}", config.article_language);
    println!("Max concurrent:    {}", config.max_concurrent);
    println!("Output directory:  {}", config.output_dir.display());
    println!(
        "Vault:             {}",
        config
            .vault_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("Token file:        {}", config.token_path.display());
    println!("Log directory:     {}", config.log_dir.display());
    println!("Debug:             {}", config.debug);
    Ok(())
}

/// Truncate to `max` characters, marking the cut with `...`
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
