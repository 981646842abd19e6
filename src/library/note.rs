//! Markdown notes written to the staging directory.
//!
//! One note per processed entry: front matter with the video metadata, an
//! embedded player, the generated article and the raw transcript.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::domain::QueueEntry;

/// Extension of every note file
pub const NOTE_EXTENSION: &str = "md";

/// Prefix marking where a note came from
pub const SOURCE_TAG: &str = "[YouTube]";

/// Longest sanitized file stem, in characters
pub const MAX_FILENAME_CHARS: usize = 200;

/// Rendered when the publish time is absent or unparseable
pub const UNKNOWN_UPLOAD_TIME: &str = "Unknown";

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const UPLOAD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turn arbitrary text into a safe file stem.
///
/// Strips characters most filesystems reject, collapses whitespace, drops
/// trailing periods and spaces, and caps the length at `max_len` characters.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let stripped: String = name.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = trim_trailing(&collapsed);

    if trimmed.is_empty() {
        return "untitled".to_string();
    }

    if trimmed.chars().count() > max_len {
        let capped: String = trimmed.chars().take(max_len).collect();
        return trim_trailing(&capped).to_string();
    }

    trimmed.to_string()
}

/// Windows refuses names ending in a period or a space
fn trim_trailing(s: &str) -> &str {
    s.trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Render an ISO-8601 publish time as `YYYY-MM-DD HH:MM:SS`.
///
/// The time is shown in the offset it was published with. Absent or
/// malformed values yield [`UNKNOWN_UPLOAD_TIME`].
pub fn format_upload_time(published_at: Option<&str>) -> String {
    let Some(raw) = published_at.map(str::trim).filter(|s| !s.is_empty()) else {
        return UNKNOWN_UPLOAD_TIME.to_string();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(UPLOAD_TIME_FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format(UPLOAD_TIME_FORMAT).to_string();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return dt.format(UPLOAD_TIME_FORMAT).to_string();
        }
    }

    UNKNOWN_UPLOAD_TIME.to_string()
}

/// Embedded player markup for a video id
fn embed_html(video_id: &str) -> String {
    format!(
        "<iframe\nsrc=\"https://www.youtube.com/embed/{}?autoplay=0&mute=1\"\n\
         frameborder=\"0\" allowfullscreen style=\"width: 100%; aspect-ratio: 16/9;\"></iframe>",
        video_id
    )
}

/// Render the full note document
pub fn render_note(entry: &QueueEntry, transcript: &str, article: &str) -> String {
    let embed = entry.embed_id().map(|id| embed_html(&id)).unwrap_or_default();
    let uploaded = format_upload_time(entry.published_at.as_deref());

    format!(
        "---\n\
         title: {title}\n\
         channel: {channel}\n\
         source: {url}\n\
         uploaded: {uploaded}\n\
         ---\n\
         \n\
         # {title}\n\
         \n\
         {embed}\n\
         \n\
         {article}\n\
         \n\
         ## Transcript\n\
         {transcript}\n",
        title = entry.title,
        channel = entry.channel,
        url = entry.url,
    )
}

/// Writes notes into the staging directory
#[derive(Debug, Clone)]
pub struct NoteWriter {
    output_dir: PathBuf,
}

impl NoteWriter {
    /// Create a writer for a staging directory
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Staging directory notes are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render the note document for an entry
    pub fn render(&self, entry: &QueueEntry, transcript: &str, article: &str) -> String {
        render_note(entry, transcript, article)
    }

    /// Candidate path for the n-th note sharing a stem (1 = no suffix)
    fn candidate(&self, stem: &str, n: u32) -> PathBuf {
        let name = if n == 1 {
            format!("{}.{}", stem, NOTE_EXTENSION)
        } else {
            format!("{}_{}.{}", stem, n, NOTE_EXTENSION)
        };
        self.output_dir.join(name)
    }

    /// Render and write a note, returning the path it landed at.
    ///
    /// A taken name gets `_2`, `_3`, ... before the extension. Files are
    /// opened with `create_new`, so two writers racing for the same name
    /// cannot overwrite each other; the loser moves on to the next suffix.
    pub async fn persist(
        &self,
        entry: &QueueEntry,
        transcript: &str,
        article: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).await.with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output_dir.display()
            )
        })?;

        let stem = sanitize_filename(&format!("{}{}", SOURCE_TAG, entry.title), MAX_FILENAME_CHARS);
        let content = self.render(entry, transcript, article);

        let mut n = 1;
        loop {
            let path = self.candidate(&stem, n);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .await
                        .with_context(|| format!("Failed to write note: {}", path.display()))?;
                    file.flush().await?;

                    info!(path = %path.display(), "Saved note");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    n += 1;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create note: {}", path.display()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn entry(title: &str, published_at: Option<&str>) -> QueueEntry {
        QueueEntry::new(
            "item-1",
            "vid123",
            title,
            "Rust Channel",
            published_at.map(str::to_string),
        )
    }

    /// Parse the `key: value` front matter block
    fn front_matter(note: &str) -> HashMap<String, String> {
        note.lines()
            .skip(1)
            .take_while(|line| *line != "---")
            .filter_map(|line| line.split_once(": "))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sanitize_strips_forbidden_characters() {
        assert_eq!(
            sanitize_filename(r#"What is <Rust>? A "safe" a/b\c|d*e: guide"#, 200),
            "What is Rust A safe abcde guide"
        );
    }

    #[test]
    fn test_sanitize_collapses_whitespace_and_trims() {
        assert_eq!(sanitize_filename("  many   spaces\tand\nlines  ", 200), "many spaces and lines");
        assert_eq!(sanitize_filename("Ends with dots...", 200), "Ends with dots");
        assert_eq!(sanitize_filename("Dot then space. .", 200), "Dot then space");
    }

    #[test]
    fn test_sanitize_empty_becomes_untitled() {
        assert_eq!(sanitize_filename("", 200), "untitled");
        assert_eq!(sanitize_filename("???***", 200), "untitled");
    }

    #[test]
    fn test_sanitize_caps_length_on_char_boundary() {
        let long = "あ".repeat(250);
        let capped = sanitize_filename(&long, 200);
        assert_eq!(capped.chars().count(), 200);

        assert_eq!(sanitize_filename("abcde fgh", 6), "abcde");
    }

    #[test]
    fn test_format_upload_time() {
        assert_eq!(
            format_upload_time(Some("2024-03-01T10:20:30Z")),
            "2024-03-01 10:20:30"
        );
        assert_eq!(
            format_upload_time(Some("2024-03-01T10:20:30+09:00")),
            "2024-03-01 10:20:30"
        );
        assert_eq!(
            format_upload_time(Some("2024-03-01T10:20:30.123")),
            "2024-03-01 10:20:30"
        );
        assert_eq!(format_upload_time(Some("2024-03-01")), "2024-03-01 00:00:00");
        assert_eq!(format_upload_time(Some("yesterday-ish")), "Unknown");
        assert_eq!(format_upload_time(Some("")), "Unknown");
        assert_eq!(format_upload_time(None), "Unknown");
    }

    #[test]
    fn test_render_front_matter_matches_entry() {
        let entry = entry("Async in Rust", Some("2024-03-01T10:20:30Z"));
        let note = render_note(&entry, "raw words", "# Summary\n\n#Rust");

        assert!(note.starts_with("---\n"));
        let header = front_matter(&note);
        assert_eq!(header["title"], entry.title);
        assert_eq!(header["channel"], entry.channel);
        assert_eq!(header["source"], entry.url);
        assert_eq!(header["uploaded"], "2024-03-01 10:20:30");

        assert!(note.contains("\n# Async in Rust\n"));
        assert!(note.contains("https://www.youtube.com/embed/vid123?autoplay=0&mute=1"));
        assert!(note.contains("# Summary\n\n#Rust"));
        assert!(note.ends_with("## Transcript\nraw words\n"));
    }

    #[test]
    fn test_render_without_video_id_omits_embed() {
        let mut entry = entry("No id", None);
        entry.video_id = String::new();
        entry.url = "https://example.com/talk".to_string();

        let note = render_note(&entry, "t", "a");
        assert!(!note.contains("<iframe"));
        assert_eq!(front_matter(&note)["uploaded"], "Unknown");
    }

    #[tokio::test]
    async fn test_persist_creates_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let writer = NoteWriter::new(temp.path().join("output"));

        let path = writer
            .persist(&entry("Hello: World?", None), "t", "a")
            .await
            .unwrap();

        assert_eq!(path, temp.path().join("output").join("[YouTube]Hello World.md"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("title: Hello: World?"));
    }

    #[tokio::test]
    async fn test_persist_same_title_gets_numbered_suffix() {
        let temp = TempDir::new().unwrap();
        let writer = NoteWriter::new(temp.path());
        let entry = entry("Same Title", None);

        let first = writer.persist(&entry, "t1", "a1").await.unwrap();
        let second = writer.persist(&entry, "t2", "a2").await.unwrap();
        let third = writer.persist(&entry, "t3", "a3").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "[YouTube]Same Title.md");
        assert_eq!(second.file_name().unwrap(), "[YouTube]Same Title_2.md");
        assert_eq!(third.file_name().unwrap(), "[YouTube]Same Title_3.md");
        assert!(std::fs::read_to_string(&first).unwrap().ends_with("t1\n"));
        assert!(std::fs::read_to_string(&second).unwrap().ends_with("t2\n"));
    }

    #[tokio::test]
    async fn test_concurrent_persist_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let writer = NoteWriter::new(temp.path());
        let entry = entry("Race", None);

        let (a, b) = tokio::join!(
            writer.persist(&entry, "one", "a"),
            writer.persist(&entry, "two", "a")
        );

        let a = a.unwrap();
        let b = b.unwrap();
        assert_ne!(a, b);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 2);
    }
}
