//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Fatal errors that stop a scan before it produces a tree.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation was interrupted.
    #[error("Operation interrupted")]
    Interrupted,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Kind of non-fatal scan failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum FailureKind {
    /// Could not enumerate a directory's subdirectories.
    DirectoryListing,
    /// Could not enumerate a directory's files.
    FileListing,
    /// Could not read a file's metadata.
    Metadata,
    /// Could not stream a file's content for checksumming.
    ContentRead,
}

/// Non-fatal failure recorded during a scan or pair comparison.
///
/// The walk continues after a failure. Entities whose listing or
/// metadata failed are left out of the tree; files whose content could not
/// be read stay in the tree without a checksum.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{kind}] at '{}': {message}", .path.display())]
pub struct ScanFailure {
    /// Kind of failure.
    pub kind: FailureKind,
    /// Path where the failure occurred.
    pub path: PathBuf,
    /// Underlying cause.
    pub message: String,
}

impl ScanFailure {
    /// Create a new failure record.
    pub fn new(kind: FailureKind, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Failure to list subdirectories.
    pub fn directory_listing(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(FailureKind::DirectoryListing, path, error.to_string())
    }

    /// Failure to list files.
    pub fn file_listing(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(FailureKind::FileListing, path, error.to_string())
    }

    /// Failure to stat a file.
    pub fn metadata(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(FailureKind::Metadata, path, error.to_string())
    }

    /// Failure to read file content.
    pub fn content_read(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(FailureKind::ContentRead, path, error.to_string())
    }
}
