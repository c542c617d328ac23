//! Core types for dircmp.
//!
//! This crate provides the data structures shared by the scanner and the
//! comparator: the checksum-annotated directory tree, per-file
//! classifications, scan failures, and scan configuration.

mod classification;
mod config;
mod error;
mod node;
mod tree;

pub use classification::{Classification, ClassificationKind, FileLink};
pub use config::{ConfigError, ScanConfig, ScanConfigBuilder, DEFAULT_CHUNK_SIZE};
pub use error::{FailureKind, ScanError, ScanFailure};
pub use node::{
    join_relative, ContentSignature, DirectoryNode, FileEntry, FileId, Files, ROOT_RELATIVE_PATH,
};
pub use tree::{DirectoryTree, TreeStats};
