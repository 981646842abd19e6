//! Tracing setup: compact stderr output plus one log file per run.
//!
//! Log files are named `<YYYYmmdd_HHMMSS>_log.log` and written through a
//! non-blocking appender. Older files beyond [`KEEP_LOG_FILES`] are removed
//! at startup.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use glob::Pattern;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How many run logs survive pruning, including the current one
pub const KEEP_LOG_FILES: usize = 10;

const LOG_FILE_SUFFIX: &str = "_log.log";

/// File name for a run started at `started`
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("{}{}", started.format("%Y%m%d_%H%M%S"), LOG_FILE_SUFFIX)
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` or `info`
/// depending on `debug`. The returned guard flushes the file writer on drop
/// and must be held for the life of the process.
pub fn init(log_dir: &Path, debug: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_name = log_file_name(Local::now());
    let appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    debug!(file = %log_dir.join(&file_name).display(), "Logging to file");

    match prune_logs(log_dir, KEEP_LOG_FILES) {
        Ok(0) => {}
        Ok(removed) => debug!(removed, "Pruned old log files"),
        Err(e) => warn!(error = %e, "Failed to prune old log files"),
    }

    Ok(guard)
}

/// Delete all but the `keep` most recently modified run logs in `log_dir`.
///
/// Returns the number of files removed.
pub fn prune_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    let pattern = format!(
        "{}/*{}",
        Pattern::escape(&log_dir.to_string_lossy()),
        LOG_FILE_SUFFIX
    );

    let mut logs: Vec<(SystemTime, PathBuf)> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .collect();

    // Newest first
    logs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove log file: {}", path.display()))?;
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filetime::FileTime;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name_format() {
        let started = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(log_file_name(started), "20240301_090507_log.log");
    }

    #[test]
    fn test_prune_keeps_newest() {
        let temp = TempDir::new().unwrap();
        for (i, name) in ["a_log.log", "b_log.log", "c_log.log", "d_log.log"]
            .iter()
            .enumerate()
        {
            let path = temp.path().join(name);
            std::fs::write(&path, "x").unwrap();
            let mtime = FileTime::from_unix_time(1_700_000_000 + i as i64 * 60, 0);
            filetime::set_file_mtime(&path, mtime).unwrap();
        }
        std::fs::write(temp.path().join("notes.txt"), "keep").unwrap();

        let removed = prune_logs(temp.path(), 2).unwrap();

        assert_eq!(removed, 2);
        assert!(!temp.path().join("a_log.log").exists());
        assert!(!temp.path().join("b_log.log").exists());
        assert!(temp.path().join("c_log.log").exists());
        assert!(temp.path().join("d_log.log").exists());
        assert!(temp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_prune_under_limit_removes_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("only_log.log"), "x").unwrap();

        assert_eq!(prune_logs(temp.path(), KEEP_LOG_FILES).unwrap(), 0);
    }
}
