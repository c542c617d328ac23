//! Directory tree container and statistics.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classification::Classification;
use crate::node::{DirectoryNode, FileEntry, Files};

/// Summary statistics for a scanned tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total size in bytes.
    pub total_size: u64,
    /// Total number of files.
    pub total_files: u64,
    /// Total number of directories below the root.
    pub total_dirs: u64,
    /// Files with an available checksum.
    pub hashed_files: u64,
    /// Files whose content could not be read.
    pub unhashed_files: u64,
    /// Maximum directory depth (root = 0).
    pub max_depth: u32,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute stats for a whole tree.
    pub fn from_root(root: &DirectoryNode) -> Self {
        let mut stats = Self::new();
        stats.visit(root, 0);
        stats
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, file: &FileEntry, depth: u32) {
        self.total_files += 1;
        self.total_size += file.size;
        self.max_depth = self.max_depth.max(depth);
        if file.has_checksum() {
            self.hashed_files += 1;
        } else {
            self.unhashed_files += 1;
        }
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn visit(&mut self, node: &DirectoryNode, depth: u32) {
        for file in &node.files {
            self.record_file(file, depth);
        }
        for dir in &node.directories {
            self.record_dir(depth + 1);
            self.visit(dir, depth + 1);
        }
    }
}

/// Complete scanned tree.
///
/// Serializes deterministically: no timestamps, durations or absolute
/// paths, so scanning unchanged content twice yields identical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryTree {
    /// Root node of the tree.
    pub root: DirectoryNode,

    /// Summary statistics.
    pub stats: TreeStats,
}

impl DirectoryTree {
    /// Wrap a root node, computing its statistics.
    pub fn new(root: DirectoryNode) -> Self {
        let stats = TreeStats::from_root(&root);
        Self { root, stats }
    }

    /// Iterate all files in pre-order.
    pub fn files(&self) -> Files<'_> {
        self.root.files()
    }

    /// Total number of files.
    pub fn file_count(&self) -> usize {
        self.root.file_count()
    }

    /// Visit every file mutably in pre-order.
    pub fn for_each_file_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&Path, &mut FileEntry),
    {
        self.root.for_each_file_mut(&mut f);
    }

    /// Look up a file by its relative path.
    pub fn find_file(&self, relative_path: &str) -> Option<&FileEntry> {
        self.files()
            .map(|(_, file)| file)
            .find(|file| file.relative_path() == relative_path)
    }

    /// Reset every file to [`Classification::Unclassified`].
    pub fn clear_classifications(&mut self) {
        self.for_each_file_mut(|_, file| file.classification = Classification::Unclassified);
    }
}
