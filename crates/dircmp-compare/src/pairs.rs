//! Explicit file-pair comparison.
//!
//! Each `(a, b)` pair is classified on its own with the same vocabulary as
//! tree comparison, without building any index.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use dircmp_core::{ClassificationKind, FailureKind, ScanConfig, ScanFailure};
use dircmp_scan::{ChecksumEngine, FileSystemGateway, LocalGateway, PathKind};

/// Two paths to compare, `a` playing the source role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePair {
    #[serde(alias = "A")]
    pub a: PathBuf,
    #[serde(alias = "B")]
    pub b: PathBuf,
}

impl FilePair {
    /// Create a new pair.
    pub fn new(a: impl Into<PathBuf>, b: impl Into<PathBuf>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }
}

/// Result for one pair: either an outcome or the failure that prevented it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairOutcome {
    pub a: PathBuf,
    pub b: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ClassificationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ScanFailure>,
}

impl PairOutcome {
    fn classified(pair: &FilePair, kind: ClassificationKind) -> Self {
        Self {
            a: pair.a.clone(),
            b: pair.b.clone(),
            result: Some(kind),
            failure: None,
        }
    }

    fn failed(pair: &FilePair, failure: ScanFailure) -> Self {
        Self {
            a: pair.a.clone(),
            b: pair.b.clone(),
            result: None,
            failure: Some(failure),
        }
    }
}

/// Compares file pairs through a [`FileSystemGateway`].
pub struct PairComparer<G = LocalGateway> {
    gateway: G,
    checksum: ChecksumEngine,
}

impl PairComparer<LocalGateway> {
    /// Compare pairs on the local filesystem.
    pub fn new(config: &ScanConfig) -> Self {
        Self::with_gateway(
            LocalGateway::new(config.follow_symlinks),
            ChecksumEngine::new(config.chunk_size),
        )
    }
}

impl<G: FileSystemGateway> PairComparer<G> {
    /// Compare pairs through a custom gateway.
    pub fn with_gateway(gateway: G, checksum: ChecksumEngine) -> Self {
        Self { gateway, checksum }
    }

    /// Classify a single pair.
    ///
    /// Sizes are compared before any content is read, so pairs of
    /// different sizes are `Modified` without hashing.
    pub fn compare(&self, pair: &FilePair) -> PairOutcome {
        match self.classify(pair) {
            Ok(kind) => PairOutcome::classified(pair, kind),
            Err(failure) => {
                tracing::warn!(
                    kind = %failure.kind,
                    path = %failure.path.display(),
                    "{}",
                    failure.message
                );
                PairOutcome::failed(pair, failure)
            }
        }
    }

    /// Classify every pair, keeping input order.
    pub fn compare_all(&self, pairs: &[FilePair]) -> Vec<PairOutcome> {
        tracing::info!(pairs = pairs.len(), "comparing file pairs");
        pairs.par_iter().map(|pair| self.compare(pair)).collect()
    }

    fn classify(&self, pair: &FilePair) -> Result<ClassificationKind, ScanFailure> {
        let a_exists = self.exists(&pair.a)?;
        let b_exists = self.exists(&pair.b)?;

        match (a_exists, b_exists) {
            (false, false) => Err(ScanFailure::new(
                FailureKind::Metadata,
                &pair.a,
                format!("neither file exists (b: '{}')", pair.b.display()),
            )),
            (false, true) => {
                self.gateway.stat_file(&pair.b)?;
                Ok(ClassificationKind::Added)
            }
            (true, false) => {
                self.gateway.stat_file(&pair.a)?;
                Ok(ClassificationKind::Deleted)
            }
            (true, true) => {
                let a_size = self.gateway.stat_file(&pair.a)?;
                let b_size = self.gateway.stat_file(&pair.b)?;
                if a_size != b_size {
                    return Ok(ClassificationKind::Modified);
                }

                let a_crc = self.checksum.checksum_file(&self.gateway, &pair.a)?;
                let b_crc = self.checksum.checksum_file(&self.gateway, &pair.b)?;
                Ok(if a_crc == b_crc {
                    ClassificationKind::Equal
                } else {
                    ClassificationKind::Modified
                })
            }
        }
    }

    fn exists(&self, path: &Path) -> Result<bool, ScanFailure> {
        match self.gateway.probe(path) {
            Ok(PathKind::Missing) => Ok(false),
            Ok(PathKind::File) => Ok(true),
            Ok(PathKind::Directory | PathKind::Other) => Err(ScanFailure::new(
                FailureKind::Metadata,
                path,
                "not a regular file",
            )),
            Err(e) => Err(ScanFailure::metadata(path, &e)),
        }
    }
}
