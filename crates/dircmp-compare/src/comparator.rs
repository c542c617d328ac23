//! Three-pass classification of two indexed trees.
//!
//! 1. **Path match**: files at the same relative path are `Equal` when
//!    their content is confirmed identical, `Modified` otherwise.
//! 2. **Moved**: per content signature, remaining files are paired by
//!    ordinal position across the two sides.
//! 3. **Leftovers**: per signature, remaining files become `Deduplicated`
//!    or `Duplicated` when the content exists on both sides, `Deleted` or
//!    `Added` when it exists on one side only. Unhashed files that found no
//!    path match are swept up last as `Deleted` or `Added`.
//!
//! Content-identical files are interchangeable: pairing within a group
//! follows pre-order and ignores names.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use dircmp_core::{Classification, DirectoryTree, FileId, FileLink};

use crate::index::FileIndex;
use crate::report::ComparisonSummary;

/// Which tree of a comparison a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Side {
    Source,
    Target,
}

/// Errors from writing a comparison back into trees.
#[derive(Debug, Error)]
pub enum CompareError {
    /// The tree does not have the shape the comparison was computed for.
    #[error("{side} tree has {actual} files, comparison expects {expected}")]
    TreeMismatch {
        side: Side,
        expected: usize,
        actual: usize,
    },
}

/// Classifications for every file of both trees, indexed by [`FileId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    source: Vec<Classification>,
    target: Vec<Classification>,
}

impl Comparison {
    fn new(source_len: usize, target_len: usize) -> Self {
        Self {
            source: vec![Classification::Unclassified; source_len],
            target: vec![Classification::Unclassified; target_len],
        }
    }

    /// Source classifications in pre-order.
    pub fn source(&self) -> &[Classification] {
        &self.source
    }

    /// Target classifications in pre-order.
    pub fn target(&self) -> &[Classification] {
        &self.target
    }

    /// Classification of one file.
    pub fn get(&self, side: Side, id: FileId) -> Option<&Classification> {
        self.side(side).get(id.index())
    }

    /// Files that no pass classified. Empty for a correct run.
    pub fn unclassified(&self) -> Vec<(Side, FileId)> {
        let pending = |side: Side, classes: &[Classification]| {
            classes
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_unclassified())
                .map(move |(i, _)| (side, FileId::new(i)))
                .collect::<Vec<_>>()
        };
        let mut all = pending(Side::Source, &self.source);
        all.extend(pending(Side::Target, &self.target));
        all
    }

    /// Counts per outcome.
    pub fn summary(&self) -> ComparisonSummary {
        ComparisonSummary::from_classifications(&self.source, &self.target)
    }

    /// Write the classifications into the trees they were computed from.
    ///
    /// Both trees are checked before either is touched.
    pub fn apply(
        &self,
        source: &mut DirectoryTree,
        target: &mut DirectoryTree,
    ) -> Result<(), CompareError> {
        Self::check_len(Side::Source, self.source.len(), source)?;
        Self::check_len(Side::Target, self.target.len(), target)?;

        Self::write(&self.source, source);
        Self::write(&self.target, target);
        Ok(())
    }

    fn check_len(side: Side, expected: usize, tree: &DirectoryTree) -> Result<(), CompareError> {
        let actual = tree.file_count();
        if actual == expected {
            Ok(())
        } else {
            Err(CompareError::TreeMismatch {
                side,
                expected,
                actual,
            })
        }
    }

    fn write(classes: &[Classification], tree: &mut DirectoryTree) {
        let mut next = classes.iter();
        tree.for_each_file_mut(|_, file| {
            if let Some(class) = next.next() {
                file.classification = class.clone();
            }
        });
    }

    fn side(&self, side: Side) -> &[Classification] {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut [Classification] {
        match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        }
    }

    fn is_assigned(&self, side: Side, id: FileId) -> bool {
        self.get(side, id).is_some_and(|c| !c.is_unclassified())
    }

    /// Assign an outcome once; later attempts are ignored.
    fn assign(&mut self, side: Side, id: FileId, class: Classification) {
        if let Some(slot) = self.side_mut(side).get_mut(id.index()) {
            debug_assert!(slot.is_unclassified(), "{side} file {} assigned twice", id.index());
            if slot.is_unclassified() {
                *slot = class;
            }
        }
    }
}

/// Classifies a source tree against a target tree.
#[derive(Debug, Clone, Copy)]
pub struct Comparator<'a> {
    source: &'a FileIndex,
    target: &'a FileIndex,
}

impl<'a> Comparator<'a> {
    /// Create a comparator over two indices.
    pub fn new(source: &'a FileIndex, target: &'a FileIndex) -> Self {
        Self { source, target }
    }

    /// Classify every file of both indices.
    pub fn compare(source: &'a FileIndex, target: &'a FileIndex) -> Comparison {
        Self::new(source, target).run()
    }

    /// Run all passes.
    pub fn run(&self) -> Comparison {
        let mut result = Comparison::new(self.source.len(), self.target.len());

        self.match_paths(&mut result);
        self.match_moved(&mut result);
        self.classify_remaining(&mut result);
        self.sweep_unhashed(&mut result);

        let missed = result.unclassified();
        for (side, id) in &missed {
            tracing::error!(%side, path = self.index(*side).path(*id), "file left unclassified");
        }
        tracing::debug!(
            source = self.source.len(),
            target = self.target.len(),
            unclassified = missed.len(),
            "comparison finished"
        );
        result
    }

    /// Pass 1: same relative path on both sides.
    fn match_paths(&self, result: &mut Comparison) {
        for source_id in self.source.ids() {
            let path = self.source.path(source_id);
            let Some(target_id) = self.target.find_path(path) else {
                continue;
            };

            let source_sig = self.source.get(source_id).and_then(|f| f.signature);
            let target_sig = self.target.get(target_id).and_then(|f| f.signature);
            let equal = matches!((source_sig, target_sig), (Some(a), Some(b)) if a == b);

            let to_target = self.link(Side::Target, target_id);
            let to_source = self.link(Side::Source, source_id);
            if equal {
                result.assign(Side::Source, source_id, Classification::Equal(to_target));
                result.assign(Side::Target, target_id, Classification::Equal(to_source));
            } else {
                result.assign(Side::Source, source_id, Classification::Modified(to_target));
                result.assign(Side::Target, target_id, Classification::Modified(to_source));
            }
        }
    }

    /// Pass 2: ordinal pairing of remaining files with the same content.
    fn match_moved(&self, result: &mut Comparison) {
        for (signature, source_group) in self.source.groups() {
            let target_group = self.target.group(signature);
            if target_group.is_empty() {
                continue;
            }

            let pending_source = Self::pending(result, Side::Source, source_group);
            let pending_target = Self::pending(result, Side::Target, target_group);

            for (source_id, target_id) in pending_source.into_iter().zip(pending_target) {
                let to_target = self.link(Side::Target, target_id);
                let to_source = self.link(Side::Source, source_id);
                result.assign(Side::Source, source_id, Classification::Moved(to_target));
                result.assign(Side::Target, target_id, Classification::Moved(to_source));
            }
        }
    }

    /// Pass 3: everything a content key still holds.
    fn classify_remaining(&self, result: &mut Comparison) {
        let keys = self
            .source
            .signatures()
            .chain(self.target.signatures())
            .unique();

        for signature in keys {
            let source_group = self.source.group(signature);
            let target_group = self.target.group(signature);
            let pending_source = Self::pending(result, Side::Source, source_group);
            let pending_target = Self::pending(result, Side::Target, target_group);

            match (source_group.is_empty(), target_group.is_empty()) {
                (false, false) => {
                    if !pending_source.is_empty() {
                        let links = self.links(Side::Target, target_group);
                        for id in pending_source {
                            let class = Classification::Deduplicated(links.clone());
                            result.assign(Side::Source, id, class);
                        }
                    } else if !pending_target.is_empty() {
                        let links = self.links(Side::Source, source_group);
                        for id in pending_target {
                            let class = Classification::Duplicated(links.clone());
                            result.assign(Side::Target, id, class);
                        }
                    }
                }
                (false, true) => {
                    for id in pending_source {
                        result.assign(Side::Source, id, Classification::Deleted);
                    }
                }
                (true, false) => {
                    for id in pending_target {
                        result.assign(Side::Target, id, Classification::Added);
                    }
                }
                (true, true) => {}
            }
        }
    }

    /// Unhashed files have no content key, so only a path match could
    /// have classified them.
    fn sweep_unhashed(&self, result: &mut Comparison) {
        let sweeps = [
            (Side::Source, Classification::Deleted),
            (Side::Target, Classification::Added),
        ];
        for (side, class) in sweeps {
            let index = self.index(side);
            let unhashed: Vec<_> = index
                .ids()
                .filter(|&id| index.get(id).is_some_and(|f| f.signature.is_none()))
                .filter(|&id| !result.is_assigned(side, id))
                .collect();
            for id in unhashed {
                result.assign(side, id, class.clone());
            }
        }
    }

    fn pending(result: &Comparison, side: Side, group: &[FileId]) -> Vec<FileId> {
        group
            .iter()
            .copied()
            .filter(|&id| !result.is_assigned(side, id))
            .collect()
    }

    fn index(&self, side: Side) -> &'a FileIndex {
        match side {
            Side::Source => self.source,
            Side::Target => self.target,
        }
    }

    fn link(&self, side: Side, id: FileId) -> FileLink {
        FileLink::new(id, self.index(side).path(id))
    }

    fn links(&self, side: Side, group: &[FileId]) -> Vec<FileLink> {
        group.iter().map(|&id| self.link(side, id)).collect()
    }
}

/// Index both trees, classify, and write the results back.
pub fn compare_trees(
    source: &mut DirectoryTree,
    target: &mut DirectoryTree,
) -> Result<ComparisonSummary, CompareError> {
    let source_index = FileIndex::build(source);
    let target_index = FileIndex::build(target);
    let comparison = Comparator::compare(&source_index, &target_index);
    comparison.apply(source, target)?;
    Ok(comparison.summary())
}
