//! Tree comparison for dircmp.
//!
//! This crate turns two scanned trees into per-file classifications:
//!
//! - **FileIndex** - path lookup plus content-signature grouping over a tree
//! - **Comparator** - path match, moved detection, then leftovers
//! - **File pairs** - classify explicit `(a, b)` pairs without indexing
//!
//! # Comparing Trees
//!
//! ```rust,no_run
//! use dircmp_compare::ComparisonReport;
//! use dircmp_scan::{ScanConfig, TreeScanner};
//!
//! let source = TreeScanner::new(ScanConfig::new("/backup/old")).scan().unwrap();
//! let target = TreeScanner::new(ScanConfig::new("/backup/new")).scan().unwrap();
//!
//! let report = ComparisonReport::from_outcomes(source, target).unwrap();
//! print!("{}", report.summary);
//! ```
//!
//! # Comparing Pairs
//!
//! ```rust,no_run
//! use dircmp_compare::{FilePair, PairComparer};
//! use dircmp_scan::ScanConfig;
//!
//! let comparer = PairComparer::new(&ScanConfig::default());
//! let outcome = comparer.compare(&FilePair::new("a.txt", "b.txt"));
//! println!("{:?}", outcome.result);
//! ```

mod comparator;
mod index;
mod pairs;
mod report;

pub use comparator::{compare_trees, CompareError, Comparator, Comparison, Side};
pub use index::{FileIndex, IndexedFile};
pub use pairs::{FilePair, PairComparer, PairOutcome};
pub use report::{ComparisonFailures, ComparisonReport, ComparisonSummary, ScanReport, SideSummary};

// Re-export core types
pub use dircmp_core::{Classification, ClassificationKind, DirectoryTree, FileId, FileLink};
