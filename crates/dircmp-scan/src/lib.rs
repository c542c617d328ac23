//! Directory scanning engine for dircmp.
//!
//! This crate walks a directory tree and produces a deterministic,
//! checksum-annotated [`DirectoryTree`].
//!
//! # Overview
//!
//! `dircmp-scan` is responsible for traversing directories and building
//! the tree structure. Key features:
//!
//! - **Two ordered phases**: metadata listing first, then CRC-32 hashing
//! - **Deterministic output**: entries sorted by name at every level
//! - **Partial-failure tolerance**: failures are collected, the walk goes on
//! - **Progress snapshots** from atomic counters on a timer-driven task
//!
//! # Example
//!
//! ```rust,no_run
//! use dircmp_scan::{ScanConfig, TreeScanner};
//!
//! let scanner = TreeScanner::new(ScanConfig::new("/path/to/scan"));
//! let outcome = scanner.scan().unwrap();
//!
//! println!("Total files: {}", outcome.tree.stats.total_files);
//! for failure in &outcome.failures {
//!     eprintln!("{failure}");
//! }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dircmp_scan::{ProgressConfig, ProgressTicker, ScanConfig, ScanProgress, TreeScanner};
//!
//! # async fn run() {
//! let scanner = Arc::new(TreeScanner::new(ScanConfig::new("/path/to/scan")));
//! let ticker = ProgressTicker::spawn(
//!     scanner.progress(),
//!     ProgressConfig::default(),
//!     |p: &ScanProgress| println!("{}: {} files", p.phase, p.current_count),
//! );
//!
//! let worker = Arc::clone(&scanner);
//! let outcome = tokio::task::spawn_blocking(move || worker.scan()).await;
//! ticker.stop().await;
//! # }
//! ```

mod checksum;
mod gateway;
mod progress;
mod scanner;

pub use checksum::{ChecksumEngine, Crc32};
pub use gateway::{
    entry_name, is_platform_artifact, FileSystemGateway, LocalGateway, PathKind, PLATFORM_ARTIFACTS,
};
pub use progress::{
    ProgressConfig, ProgressSink, ProgressState, ProgressTicker, ScanPhase, ScanProgress,
};
pub use scanner::{ScanOutcome, TreeScanner};

// Re-export core types for convenience
pub use dircmp_core::{
    DirectoryNode, DirectoryTree, FailureKind, FileEntry, ScanConfig, ScanError, ScanFailure,
    TreeStats,
};
