//! Persistable results of a scan or a comparison.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use dircmp_core::{Classification, ClassificationKind, DirectoryTree, ScanFailure};
use dircmp_scan::ScanOutcome;

use crate::comparator::{compare_trees, CompareError};

/// Outcome counts for one side of a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideSummary {
    /// Number of files on this side.
    pub files: usize,
    /// Files per outcome. Outcomes with no files are omitted.
    pub counts: BTreeMap<ClassificationKind, usize>,
    /// Files left without an outcome.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unclassified: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl SideSummary {
    fn tally(classes: &[Classification]) -> Self {
        let mut summary = Self {
            files: classes.len(),
            ..Self::default()
        };
        for class in classes {
            match class.kind() {
                Some(kind) => *summary.counts.entry(kind).or_default() += 1,
                None => summary.unclassified += 1,
            }
        }
        summary
    }

    /// Number of files with `kind`.
    pub fn count(&self, kind: ClassificationKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// Outcome counts for both sides of a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub source: SideSummary,
    pub target: SideSummary,
}

impl ComparisonSummary {
    /// Summarize raw classifications.
    pub fn from_classifications(source: &[Classification], target: &[Classification]) -> Self {
        Self {
            source: SideSummary::tally(source),
            target: SideSummary::tally(target),
        }
    }

    /// Check whether every file on both sides is `Equal`.
    pub fn is_identical(&self) -> bool {
        let all_equal = |side: &SideSummary| side.count(ClassificationKind::Equal) == side.files;
        all_equal(&self.source) && all_equal(&self.target)
    }
}

impl fmt::Display for ComparisonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14}{:>10}{:>10}", "", "source", "target")?;
        writeln!(f, "{:<14}{:>10}{:>10}", "files", self.source.files, self.target.files)?;
        for kind in ClassificationKind::iter() {
            let (s, t) = (self.source.count(kind), self.target.count(kind));
            if s > 0 || t > 0 {
                writeln!(f, "{:<14}{:>10}{:>10}", kind.to_string(), s, t)?;
            }
        }
        if self.source.unclassified > 0 || self.target.unclassified > 0 {
            writeln!(
                f,
                "{:<14}{:>10}{:>10}",
                "unclassified", self.source.unclassified, self.target.unclassified
            )?;
        }
        Ok(())
    }
}

/// Failures recorded while scanning each side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonFailures {
    pub source: Vec<ScanFailure>,
    pub target: Vec<ScanFailure>,
}

impl ComparisonFailures {
    /// Total number of failures.
    pub fn len(&self) -> usize {
        self.source.len() + self.target.len()
    }

    /// Check whether neither scan failed anywhere.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.target.is_empty()
    }
}

/// Both annotated trees of a comparison, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub source: DirectoryTree,
    pub target: DirectoryTree,
    pub summary: ComparisonSummary,
    #[serde(default, skip_serializing_if = "ComparisonFailures::is_empty")]
    pub failures: ComparisonFailures,
}

impl ComparisonReport {
    /// Classify two scan outcomes against each other.
    pub fn from_outcomes(source: ScanOutcome, target: ScanOutcome) -> Result<Self, CompareError> {
        let (mut source_tree, mut target_tree) = (source.tree, target.tree);
        let summary = compare_trees(&mut source_tree, &mut target_tree)?;

        Ok(Self {
            source: source_tree,
            target: target_tree,
            summary,
            failures: ComparisonFailures {
                source: source.failures,
                target: target.failures,
            },
        })
    }

    /// Check whether either scan recorded a failure.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// A single scanned tree, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub tree: DirectoryTree,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    /// Check whether the scan recorded a failure.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl From<ScanOutcome> for ScanReport {
    fn from(outcome: ScanOutcome) -> Self {
        Self {
            tree: outcome.tree,
            failures: outcome.failures,
        }
    }
}
