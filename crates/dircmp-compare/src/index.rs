//! Path and content lookups over a finished tree.

use std::collections::HashMap;

use indexmap::IndexMap;

use dircmp_core::{ContentSignature, DirectoryTree, FileId};

/// What the comparator needs to know about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    /// Path relative to the scan root.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Content signature, `None` when the checksum is unavailable.
    pub signature: Option<ContentSignature>,
}

/// Read-only index of a [`DirectoryTree`].
///
/// Files are numbered by [`FileId`] in tree pre-order. Content groups list
/// their members in the same order, and the groups themselves keep the
/// order in which their signature first appeared.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    files: Vec<IndexedFile>,
    by_path: HashMap<String, FileId>,
    by_content: IndexMap<ContentSignature, Vec<FileId>>,
}

impl FileIndex {
    /// Index every file of `tree`.
    pub fn build(tree: &DirectoryTree) -> Self {
        let mut index = Self {
            files: Vec::with_capacity(tree.file_count()),
            ..Self::default()
        };

        for (_, file) in tree.files() {
            let id = FileId::new(index.files.len());
            let path = file.relative_path();
            let signature = file.signature();

            if index.by_path.insert(path.clone(), id).is_some() {
                tracing::warn!(%path, "duplicate relative path, later entry wins");
            }
            // Unhashed files cannot be matched by content.
            if let Some(signature) = signature {
                index.by_content.entry(signature).or_default().push(id);
            }
            index.files.push(IndexedFile {
                path,
                size: file.size,
                signature,
            });
        }

        tracing::debug!(
            files = index.files.len(),
            signatures = index.by_content.len(),
            "built file index"
        );
        index
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check whether the tree had no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a file by id.
    pub fn get(&self, id: FileId) -> Option<&IndexedFile> {
        self.files.get(id.index())
    }

    /// Relative path of a file, empty for an unknown id.
    pub fn path(&self, id: FileId) -> &str {
        self.get(id).map_or("", |file| file.path.as_str())
    }

    /// All ids in pre-order.
    pub fn ids(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.files.len()).map(FileId::new)
    }

    /// PathIndex lookup.
    pub fn find_path(&self, relative_path: &str) -> Option<FileId> {
        self.by_path.get(relative_path).copied()
    }

    /// ContentIndex lookup; empty when no file has this signature.
    pub fn group(&self, signature: &ContentSignature) -> &[FileId] {
        self.by_content
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Content signatures in first-appearance order.
    pub fn signatures(&self) -> impl Iterator<Item = &ContentSignature> + '_ {
        self.by_content.keys()
    }

    /// Content groups in first-appearance order.
    pub fn groups(&self) -> impl Iterator<Item = (&ContentSignature, &[FileId])> + '_ {
        self.by_content.iter().map(|(sig, ids)| (sig, ids.as_slice()))
    }
}
