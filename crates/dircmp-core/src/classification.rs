//! Per-file comparison outcomes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::node::FileId;

/// Non-owning reference to a file in the other tree of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLink {
    /// Pre-order id of the counterpart in its own tree.
    pub id: FileId,
    /// Relative path of the counterpart.
    pub path: String,
}

impl FileLink {
    /// Create a new link.
    pub fn new(id: FileId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }
}

/// Outcome of comparing one file against the other tree.
///
/// Links always point into the *other* tree: a source file links to
/// target files and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "links")]
pub enum Classification {
    /// Not yet compared.
    #[default]
    Unclassified,
    /// Same relative path, same size and checksum.
    Equal(FileLink),
    /// Same content found at a different path.
    Moved(FileLink),
    /// Same relative path, different content.
    Modified(FileLink),
    /// Only present in the target.
    Added,
    /// Only present in the source.
    Deleted,
    /// Extra target copy of content that also exists in the source.
    Duplicated(Vec<FileLink>),
    /// Extra source copy of content that still exists in the target.
    Deduplicated(Vec<FileLink>),
}

impl Classification {
    /// Check whether no outcome has been assigned.
    pub fn is_unclassified(&self) -> bool {
        matches!(self, Classification::Unclassified)
    }

    /// The outcome without its links.
    pub fn kind(&self) -> Option<ClassificationKind> {
        Some(match self {
            Classification::Unclassified => return None,
            Classification::Equal(_) => ClassificationKind::Equal,
            Classification::Moved(_) => ClassificationKind::Moved,
            Classification::Modified(_) => ClassificationKind::Modified,
            Classification::Added => ClassificationKind::Added,
            Classification::Deleted => ClassificationKind::Deleted,
            Classification::Duplicated(_) => ClassificationKind::Duplicated,
            Classification::Deduplicated(_) => ClassificationKind::Deduplicated,
        })
    }

    /// Counterpart links in the other tree.
    pub fn links(&self) -> &[FileLink] {
        match self {
            Classification::Equal(link)
            | Classification::Moved(link)
            | Classification::Modified(link) => std::slice::from_ref(link),
            Classification::Duplicated(links) | Classification::Deduplicated(links) => links,
            Classification::Unclassified | Classification::Added | Classification::Deleted => &[],
        }
    }
}

/// Classification vocabulary shared by tree and file-pair comparisons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
pub enum ClassificationKind {
    Equal,
    Added,
    Deleted,
    Moved,
    Modified,
    Duplicated,
    Deduplicated,
}
