//! File and directory node types.

use std::fmt;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::classification::Classification;

/// Relative path of the scan root.
pub const ROOT_RELATIVE_PATH: &str = "/";

/// Join a relative directory path and a name with `/`.
///
/// The root is `/`, so its entries become `/name`; every other directory
/// produces `dir/name`.
pub fn join_relative(directory: &str, name: &str) -> String {
    if directory == ROOT_RELATIVE_PATH {
        format!("/{name}")
    } else {
        format!("{directory}/{name}")
    }
}

/// Position of a file within its tree's pre-order traversal.
///
/// Ids are only meaningful for the tree they were computed from; links
/// between two trees carry the id of the file on the *other* side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub usize);

impl FileId {
    /// Create a new FileId from a traversal position.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the id as a vector index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Composite `(size, checksum)` key for "same content".
///
/// CRC-32 is not collision resistant; two different files sharing a
/// signature are treated as identical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentSignature {
    /// File size in bytes.
    pub size: u64,
    /// CRC-32 of the file content.
    pub checksum: u32,
}

impl ContentSignature {
    /// Create a new signature.
    pub fn new(size: u64, checksum: u32) -> Self {
        Self { size, checksum }
    }
}

impl fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08X}", self.size, self.checksum)
    }
}

/// A single file in a scanned directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name (not full path).
    pub name: CompactString,

    /// Relative path of the containing directory.
    pub directory: String,

    /// Size in bytes.
    pub size: u64,

    /// CRC-32 of the content, `None` when the content could not be read.
    pub checksum: Option<u32>,

    /// Comparison outcome, assigned by the comparator.
    #[serde(default, skip_serializing_if = "Classification::is_unclassified")]
    pub classification: Classification,

    /// Path on the scanning host, exactly as listed. `name` may be an
    /// escaped form of the on-disk name, so content is read through this.
    #[serde(skip)]
    pub absolute_path: PathBuf,
}

impl FileEntry {
    /// Create an entry that has not been hashed yet.
    pub fn new(name: impl Into<CompactString>, directory: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            size,
            checksum: None,
            classification: Classification::Unclassified,
            absolute_path: PathBuf::new(),
        }
    }

    /// Set the host path, builder style.
    pub fn with_absolute_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.absolute_path = path.into();
        self
    }

    /// Set the checksum, builder style.
    pub fn with_checksum(mut self, checksum: u32) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Path of this file relative to the scan root.
    pub fn relative_path(&self) -> String {
        join_relative(&self.directory, &self.name)
    }

    /// Content signature, if the checksum is available.
    pub fn signature(&self) -> Option<ContentSignature> {
        self.checksum.map(|crc| ContentSignature::new(self.size, crc))
    }

    /// Check whether the content checksum is available.
    pub fn has_checksum(&self) -> bool {
        self.checksum.is_some()
    }
}

/// A directory with its files and subdirectories, each sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Absolute path on the scanning host. Not serialized, so artifacts
    /// do not depend on where the tree was mounted.
    #[serde(skip)]
    pub absolute_path: PathBuf,

    /// Directory name.
    pub name: CompactString,

    /// Path relative to the scan root (`/` for the root).
    pub path: String,

    /// Files in this directory, sorted by name.
    pub files: Vec<FileEntry>,

    /// Subdirectories, sorted by name.
    pub directories: Vec<DirectoryNode>,
}

impl DirectoryNode {
    /// Create the root node of a tree.
    pub fn new_root(absolute_path: impl Into<PathBuf>) -> Self {
        let absolute_path = absolute_path.into();
        let name = absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| absolute_path.to_string_lossy().to_string());

        Self {
            absolute_path,
            name: name.into(),
            path: ROOT_RELATIVE_PATH.to_string(),
            files: Vec::new(),
            directories: Vec::new(),
        }
    }

    /// Create a child node of the directory at `parent_path`.
    pub fn new_child(
        absolute_path: impl Into<PathBuf>,
        name: impl Into<CompactString>,
        parent_path: &str,
    ) -> Self {
        let name = name.into();
        Self {
            absolute_path: absolute_path.into(),
            path: join_relative(parent_path, &name),
            name,
            files: Vec::new(),
            directories: Vec::new(),
        }
    }

    /// Sort files and subdirectories by name, independently, at this level.
    pub fn sort_entries(&mut self) {
        self.files.sort_by(|a, b| a.name.cmp(&b.name));
        self.directories.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Number of files in this subtree.
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .directories
                .iter()
                .map(DirectoryNode::file_count)
                .sum::<usize>()
    }

    /// Number of directories below this node.
    pub fn dir_count(&self) -> usize {
        self.directories.len()
            + self
                .directories
                .iter()
                .map(DirectoryNode::dir_count)
                .sum::<usize>()
    }

    /// Iterate all files of this subtree in pre-order.
    pub fn files(&self) -> Files<'_> {
        Files {
            stack: vec![self],
            current: None,
        }
    }

    /// Visit every file of this subtree mutably, in pre-order, together
    /// with the absolute path of its containing directory.
    pub fn for_each_file_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&Path, &mut FileEntry),
    {
        for file in &mut self.files {
            f(&self.absolute_path, file);
        }
        for dir in &mut self.directories {
            dir.for_each_file_mut(f);
        }
    }

    /// Collect mutable references to every file together with its
    /// absolute path, in pre-order. Entries without a host path resolve
    /// against their directory.
    pub fn files_with_paths_mut(&mut self) -> Vec<(PathBuf, &mut FileEntry)> {
        let mut out = Vec::new();
        collect_files_mut(self, &mut out);
        out
    }
}

fn collect_files_mut<'a>(node: &'a mut DirectoryNode, out: &mut Vec<(PathBuf, &'a mut FileEntry)>) {
    let DirectoryNode {
        absolute_path,
        files,
        directories,
        ..
    } = node;
    for file in files.iter_mut() {
        let path = if file.absolute_path.as_os_str().is_empty() {
            absolute_path.join(file.name.as_str())
        } else {
            file.absolute_path.clone()
        };
        out.push((path, file));
    }
    for dir in directories.iter_mut() {
        collect_files_mut(dir, out);
    }
}

/// Pre-order iterator over the files of a directory subtree.
///
/// Yields each file with its containing directory. A directory's own
/// files come before those of its subdirectories.
pub struct Files<'a> {
    stack: Vec<&'a DirectoryNode>,
    current: Option<(&'a DirectoryNode, std::slice::Iter<'a, FileEntry>)>,
}

impl<'a> Iterator for Files<'a> {
    type Item = (&'a DirectoryNode, &'a FileEntry);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((dir, iter)) = self.current.as_mut() {
                if let Some(file) = iter.next() {
                    return Some((*dir, file));
                }
            }

            let node = self.stack.pop()?;
            self.stack.extend(node.directories.iter().rev());
            self.current = Some((node, node.files.iter()));
        }
    }
}
