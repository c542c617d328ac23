//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::{Builder, UninitializedFieldError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default read chunk for checksumming: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Error returned by [`ScanConfigBuilder::build`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not set.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<UninitializedFieldError> for ConfigError {
    fn from(err: UninitializedFieldError) -> Self {
        Self::MissingField(err.field_name())
    }
}

impl From<String> for ConfigError {
    fn from(message: String) -> Self {
        Self::Invalid(message)
    }
}

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(
    setter(into),
    build_fn(validate = "Self::validate", error = "ConfigError")
)]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Follow symbolic links to files and directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Read buffer size used while checksumming.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Checksum files on a rayon pool instead of the scanning thread.
    #[builder(default = "false")]
    #[serde(default)]
    pub parallel_hashing: bool,

    /// Number of hashing threads (0 = auto-detect). Only used with
    /// `parallel_hashing`.
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        }
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel_hashing: false,
            threads: 0,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
