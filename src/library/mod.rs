//! Note files on disk.
//!
//! Notes are written to a local staging directory first and moved into the
//! archive (an Obsidian vault, typically) once a batch has finished.
//!
//! # Layout
//!
//! ```text
//! output/                       # staging
//! └── [YouTube]<title>.md       # `_2`, `_3`, ... on name collisions
//! <vault>/
//! └── [YouTube]<title>.md       # `_1`, `_2`, ... if taken in the archive
//! ```

pub mod archive;
pub mod note;

pub use archive::{cleanup_empty, relocate};
pub use note::{format_upload_time, render_note, sanitize_filename, NoteWriter};
