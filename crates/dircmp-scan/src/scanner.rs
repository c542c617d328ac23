//! Deterministic two-phase directory scanner.
//!
//! Phase A walks the tree depth-first, listing files and subdirectories and
//! reading file sizes. Phase B traverses the finished tree and fills in
//! checksums. Both phases visit entries in name order, so the resulting tree
//! and the failure list only depend on the filesystem content.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use dircmp_core::{
    DirectoryNode, DirectoryTree, FailureKind, FileEntry, ScanConfig, ScanError, ScanFailure,
};

use crate::checksum::ChecksumEngine;
use crate::gateway::{entry_name, FileSystemGateway, LocalGateway, PathKind};
use crate::progress::{ProgressState, ScanPhase};

/// Result of a scan: the tree plus every non-fatal failure, in walk order.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// The scanned tree.
    pub tree: DirectoryTree,
    /// Failures recorded during both phases.
    pub failures: Vec<ScanFailure>,
    /// Wall-clock duration of the scan.
    pub duration: Duration,
}

impl ScanOutcome {
    /// Check whether anything failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Scanner that builds checksum-annotated [`DirectoryTree`]s.
pub struct TreeScanner<G = LocalGateway> {
    gateway: G,
    config: ScanConfig,
    checksum: ChecksumEngine,
    progress: Arc<ProgressState>,
    cancel: Option<CancellationToken>,
}

impl TreeScanner<LocalGateway> {
    /// Create a scanner over the local filesystem.
    pub fn new(config: ScanConfig) -> Self {
        let gateway = LocalGateway::new(config.follow_symlinks);
        Self::with_gateway(gateway, config)
    }
}

impl<G: FileSystemGateway> TreeScanner<G> {
    /// Create a scanner over a custom gateway.
    pub fn with_gateway(gateway: G, config: ScanConfig) -> Self {
        Self {
            checksum: ChecksumEngine::new(config.chunk_size),
            gateway,
            config,
            progress: Arc::new(ProgressState::new()),
            cancel: None,
        }
    }

    /// Abort the scan with [`ScanError::Interrupted`] once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Shared progress counters, for a reporting task.
    pub fn progress(&self) -> Arc<ProgressState> {
        Arc::clone(&self.progress)
    }

    /// Scan configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan the configured root.
    pub fn scan(&self) -> Result<ScanOutcome, ScanError> {
        self.scan_root(&self.config.root)
    }

    /// Scan `root` with this scanner's settings.
    ///
    /// Only an unusable root or cancellation is fatal; everything else is
    /// recorded in [`ScanOutcome::failures`] and the walk continues.
    pub fn scan_root(&self, root: &Path) -> Result<ScanOutcome, ScanError> {
        let start = Instant::now();
        self.progress.reset();

        match self.gateway.probe(root).map_err(|e| ScanError::io(root, e))? {
            PathKind::Directory => {}
            PathKind::Missing => {
                return Err(ScanError::NotFound {
                    path: root.to_path_buf(),
                });
            }
            PathKind::File | PathKind::Other => {
                return Err(ScanError::NotADirectory {
                    path: root.to_path_buf(),
                });
            }
        }

        let mut failures = Vec::new();

        tracing::info!(root = %root.display(), "listing directory tree");
        self.progress.set_phase(ScanPhase::Listing);
        let mut root_node = DirectoryNode::new_root(root);
        let mut ancestors: Vec<PathBuf> =
            self.gateway.directory_identity(root).into_iter().collect();
        self.collect_directory(&mut root_node, &mut ancestors, &mut failures)?;

        tracing::info!(
            files = self.progress.files_seen(),
            parallel = self.config.parallel_hashing,
            "computing checksums"
        );
        self.progress.set_phase(ScanPhase::Hashing);
        self.hash_tree(&mut root_node, &mut failures)?;
        self.progress.set_phase(ScanPhase::Done);

        let tree = DirectoryTree::new(root_node);
        let duration = start.elapsed();
        tracing::info!(
            root = %root.display(),
            files = tree.stats.total_files,
            dirs = tree.stats.total_dirs,
            failures = failures.len(),
            elapsed_ms = duration.as_millis() as u64,
            "scan complete"
        );

        Ok(ScanOutcome {
            tree,
            failures,
            duration,
        })
    }

    /// Phase A: list and stat one directory, then recurse into its
    /// subdirectories in name order.
    ///
    /// `ancestors` holds the resolved identities of the directories on the
    /// current branch. A subdirectory resolving to one of them is recorded
    /// as a listing failure and not entered.
    fn collect_directory(
        &self,
        node: &mut DirectoryNode,
        ancestors: &mut Vec<PathBuf>,
        failures: &mut Vec<ScanFailure>,
    ) -> Result<(), ScanError> {
        self.check_cancelled()?;
        self.progress.record_dir();
        tracing::trace!(path = %node.absolute_path.display(), "entering directory");

        match self.gateway.list_files(&node.absolute_path) {
            Ok(paths) => {
                for path in sorted_by_name(paths) {
                    match self.gateway.stat_file(&path) {
                        Ok(size) => {
                            self.progress.record_file_seen(size);
                            let entry = FileEntry::new(entry_name(&path), node.path.clone(), size)
                                .with_absolute_path(path);
                            node.files.push(entry);
                        }
                        Err(failure) => self.record_failure(failure, failures),
                    }
                }
            }
            Err(failure) => self.record_failure(failure, failures),
        }

        match self.gateway.list_subdirectories(&node.absolute_path) {
            Ok(paths) => {
                for path in sorted_by_name(paths) {
                    let identity = self.gateway.directory_identity(&path);
                    if let Some(target) = identity.as_ref().filter(|id| ancestors.contains(*id)) {
                        let failure = ScanFailure::new(
                            FailureKind::DirectoryListing,
                            &path,
                            format!("directory cycle: resolves to '{}'", target.display()),
                        );
                        self.record_failure(failure, failures);
                        continue;
                    }

                    let name = entry_name(&path);
                    let mut child = DirectoryNode::new_child(path, name, &node.path);
                    let depth = ancestors.len();
                    ancestors.extend(identity);
                    self.collect_directory(&mut child, ancestors, failures)?;
                    ancestors.truncate(depth);
                    node.directories.push(child);
                }
            }
            Err(failure) => self.record_failure(failure, failures),
        }

        node.sort_entries();
        Ok(())
    }

    /// Phase B: checksum every file of the Phase A tree.
    fn hash_tree(
        &self,
        root: &mut DirectoryNode,
        failures: &mut Vec<ScanFailure>,
    ) -> Result<(), ScanError> {
        let mut entries = root.files_with_paths_mut();

        if !self.config.parallel_hashing {
            for (path, file) in entries.iter_mut() {
                self.check_cancelled()?;
                if let Some(failure) = self.hash_file(path.as_path(), &mut **file) {
                    self.record_failure(failure, failures);
                }
            }
            return Ok(());
        }

        let results = if self.config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| ScanError::InvalidConfig {
                    message: e.to_string(),
                })?;
            pool.install(|| self.hash_parallel(&mut entries))
        } else {
            self.hash_parallel(&mut entries)
        };

        self.check_cancelled()?;
        // Collected in pre-order, so failures match the sequential run.
        for failure in results.into_iter().flatten() {
            self.record_failure(failure, failures);
        }
        Ok(())
    }

    fn hash_parallel(&self, entries: &mut [(PathBuf, &mut FileEntry)]) -> Vec<Option<ScanFailure>> {
        entries
            .par_iter_mut()
            .map(|(path, file)| {
                if self.is_cancelled() {
                    return None;
                }
                self.hash_file(path.as_path(), &mut **file)
            })
            .collect()
    }

    /// Checksum one file, leaving the checksum unset on failure.
    fn hash_file(&self, path: &Path, file: &mut FileEntry) -> Option<ScanFailure> {
        let ticket = self.progress.begin_file(path);

        let result = self.gateway.open_file(path).and_then(|reader| {
            self.checksum
                .checksum_reader_with(reader, |n| self.progress.add_bytes_hashed(n as u64))
                .map_err(|e| ScanFailure::content_read(path, &e))
        });
        self.progress.finish_file(ticket);

        match result {
            Ok(crc) => {
                file.checksum = Some(crc);
                None
            }
            Err(failure) => {
                file.checksum = None;
                Some(failure)
            }
        }
    }

    fn record_failure(&self, failure: ScanFailure, failures: &mut Vec<ScanFailure>) {
        tracing::warn!(
            kind = %failure.kind,
            path = %failure.path.display(),
            "{}",
            failure.message
        );
        self.progress.record_failure();
        failures.push(failure);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn check_cancelled(&self) -> Result<(), ScanError> {
        if self.is_cancelled() {
            Err(ScanError::Interrupted)
        } else {
            Ok(())
        }
    }
}

fn sorted_by_name(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort_by_cached_key(|p| entry_name(p));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();

        temp
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let scanner = TreeScanner::new(ScanConfig::new(temp.path()));
        let outcome = scanner.scan().unwrap();

        assert!(!outcome.has_failures());
        assert_eq!(outcome.tree.stats.total_files, 4);
        assert_eq!(outcome.tree.stats.total_dirs, 3);
        assert_eq!(outcome.tree.stats.hashed_files, 4);
        assert_eq!(outcome.tree.stats.max_depth, 2);
    }

    #[test]
    fn test_relative_paths_and_checksums() {
        let temp = create_test_tree();
        let outcome = TreeScanner::new(ScanConfig::new(temp.path()))
            .scan()
            .unwrap();

        let file = outcome.tree.find_file("/dir1/subdir/file3.txt").unwrap();
        assert_eq!(file.directory, "/dir1/subdir");
        assert_eq!(file.size, 4);
        assert_eq!(file.checksum, Some(ChecksumEngine::checksum_bytes(b"test")));
    }

    #[test]
    fn test_progress_counters_after_scan() {
        let temp = create_test_tree();
        let scanner = TreeScanner::new(ScanConfig::new(temp.path()));
        scanner.scan().unwrap();

        let snap = scanner.progress().snapshot(Duration::from_secs(5));
        assert_eq!(snap.phase, ScanPhase::Done);
        assert_eq!(snap.current_count, 4);
        assert_eq!(snap.total_count, Some(4));
        assert_eq!(snap.current_bytes, snap.total_bytes.unwrap());
        assert_eq!(snap.dirs_scanned, 4);
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp = create_test_tree();
        let scanner = TreeScanner::new(ScanConfig::new(temp.path()));

        let err = scanner.scan_root(&temp.path().join("file1.txt")).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory { .. }));

        let err = scanner.scan_root(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[test]
    fn test_cancelled_scan_is_interrupted() {
        let temp = create_test_tree();
        let token = CancellationToken::new();
        token.cancel();

        let scanner = TreeScanner::new(ScanConfig::new(temp.path())).with_cancellation(token);
        assert!(matches!(scanner.scan(), Err(ScanError::Interrupted)));
    }

    #[test]
    fn test_sorted_by_name_uses_last_component() {
        let paths = vec![
            PathBuf::from("/x/b"),
            PathBuf::from("/a/c"),
            PathBuf::from("/z/a"),
        ];
        assert_eq!(
            sorted_by_name(paths),
            vec![
                PathBuf::from("/z/a"),
                PathBuf::from("/x/b"),
                PathBuf::from("/a/c")
            ]
        );
    }
}
