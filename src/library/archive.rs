//! Moves finished notes from the staging directory into the archive.
//!
//! Every failure here is logged and skipped. Moving zero files is a valid
//! outcome, not an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tokio::fs;
use tracing::{error, info, warn};

use super::note::NOTE_EXTENSION;

/// List note files directly inside `source_dir`, sorted by name
pub fn note_files(source_dir: &Path) -> Result<Vec<PathBuf>, glob::PatternError> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&source_dir.to_string_lossy()),
        NOTE_EXTENSION
    );

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping unreadable path"),
        }
    }

    Ok(files)
}

/// First free destination for `file_name`: the name itself, then `<stem>_1`, `<stem>_2`, ...
async fn free_destination(dest_dir: &Path, file_name: &str) -> PathBuf {
    let destination = dest_dir.join(file_name);
    if !exists(&destination).await {
        return destination;
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (file_name, String::new()),
    };

    let mut counter = 1u32;
    loop {
        let candidate = dest_dir.join(format!("{}_{}{}", stem, counter, ext));
        if !exists(&candidate).await {
            return candidate;
        }
        counter += 1;
    }
}

/// Unknown counts as taken so nothing is ever overwritten
async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(true)
}

/// Rename, falling back to copy + remove across filesystems
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
        Err(_) => {
            fs::copy(from, to).await?;
            fs::remove_file(from).await
        }
    }
}

/// Move every note in `source_dir` into `dest_dir`.
///
/// Existing destination files are never overwritten; the moved file is
/// renamed instead. Returns how many files were moved.
pub async fn relocate(source_dir: &Path, dest_dir: &Path) -> usize {
    if !exists(dest_dir).await {
        error!(dest = %dest_dir.display(), "Archive directory does not exist");
        return 0;
    }
    if !dest_dir.is_dir() {
        error!(dest = %dest_dir.display(), "Archive path is not a directory");
        return 0;
    }
    if !source_dir.exists() {
        warn!(source = %source_dir.display(), "Staging directory does not exist");
        return 0;
    }

    let files = match note_files(source_dir) {
        Ok(files) => files,
        Err(e) => {
            error!(source = %source_dir.display(), error = %e, "Invalid staging path");
            return 0;
        }
    };
    if files.is_empty() {
        info!(source = %source_dir.display(), "No notes to move");
        return 0;
    }

    let mut moved = 0;
    for path in files {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        let destination = free_destination(dest_dir, &file_name).await;
        if destination != dest_dir.join(&file_name) {
            warn!(
                from = %file_name,
                to = %destination.display(),
                "Name taken in archive, renaming"
            );
        }

        match move_file(&path, &destination).await {
            Ok(()) => {
                info!(file = %file_name, dest = %dest_dir.display(), "Moved note");
                moved += 1;
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to move note");
            }
        }
    }

    moved
}

/// Remove `dir` if it exists and is empty; otherwise do nothing
pub async fn cleanup_empty(dir: &Path) {
    if !dir.is_dir() {
        return;
    }

    let is_empty = match fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "Failed to read directory");
            return;
        }
    };

    if !is_empty {
        return;
    }

    match fs::remove_dir(dir).await {
        Ok(()) => info!(dir = %dir.display(), "Removed empty directory"),
        Err(e) => error!(dir = %dir.display(), error = %e, "Failed to remove directory"),
    }
}
