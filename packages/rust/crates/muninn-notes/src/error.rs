//! Error types for scanning, caching and snapshot persistence.
//!
//! Library code uses `thiserror` for explicit error enums; the `muninn`
//! binary wraps them in `anyhow` at the process boundary.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for the notes core.
///
/// Each variant represents a specific failure mode in the scan/cache pipeline.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Reading a document (or its metadata) failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Notes root is missing or not a directory.
    #[error("Notes root is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// Document parser rejected a file.
    #[error("Parse error in {}: {message}", path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser-provided reason.
        message: String,
    },

    /// Document glob pattern does not compile.
    #[error("Invalid document pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// Cache snapshot could not be encoded.
    #[error("Failed to encode cache snapshot: {0}")]
    SnapshotEncode(#[from] serde_json::Error),

    /// Cache snapshot could not be written or removed.
    #[error("Failed to write cache snapshot {}: {source}", path.display())]
    SnapshotWrite {
        /// Snapshot file path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl NotesError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn snapshot_write(path: &Path, source: std::io::Error) -> Self {
        Self::SnapshotWrite {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the error means the file disappeared mid-scan.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NotesError>;
