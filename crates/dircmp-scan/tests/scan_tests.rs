use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use dircmp_scan::{
    ChecksumEngine, FailureKind, FileSystemGateway, PathKind, ScanConfig, ScanFailure,
    TreeScanner,
};
use tempfile::TempDir;

/// In-memory filesystem with injectable failures.
#[derive(Default)]
struct MemoryGateway {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
    fail_dir_listing: BTreeSet<PathBuf>,
    fail_file_listing: BTreeSet<PathBuf>,
    fail_stat: BTreeSet<PathBuf>,
    fail_read: BTreeSet<PathBuf>,
}

impl MemoryGateway {
    fn new(root: &str) -> Self {
        let mut gateway = Self::default();
        gateway.dirs.insert(PathBuf::from(root));
        gateway
    }

    fn dir(mut self, path: &str) -> Self {
        self.dirs.insert(PathBuf::from(path));
        self
    }

    fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(PathBuf::from(path), content.to_vec());
        self
    }

    fn denied(err: &str) -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, err.to_string())
    }
}

impl FileSystemGateway for MemoryGateway {
    fn list_subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanFailure> {
        if self.fail_dir_listing.contains(dir) {
            return Err(ScanFailure::directory_listing(dir, &Self::denied("denied")));
        }
        Ok(self
            .dirs
            .iter()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanFailure> {
        if self.fail_file_listing.contains(dir) {
            return Err(ScanFailure::file_listing(dir, &Self::denied("denied")));
        }
        Ok(self
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn stat_file(&self, path: &Path) -> Result<u64, ScanFailure> {
        if self.fail_stat.contains(path) {
            return Err(ScanFailure::metadata(path, &Self::denied("stat failed")));
        }
        self.files
            .get(path)
            .map(|c| c.len() as u64)
            .ok_or_else(|| ScanFailure::metadata(path, &io::ErrorKind::NotFound.into()))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn Read + Send>, ScanFailure> {
        if self.fail_read.contains(path) {
            return Err(ScanFailure::content_read(path, &Self::denied("read failed")));
        }
        let content = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| ScanFailure::content_read(path, &io::ErrorKind::NotFound.into()))?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn probe(&self, path: &Path) -> io::Result<PathKind> {
        Ok(if self.dirs.contains(path) {
            PathKind::Directory
        } else if self.files.contains_key(path) {
            PathKind::File
        } else {
            PathKind::Missing
        })
    }
}

fn memory_fixture() -> MemoryGateway {
    MemoryGateway::new("/root")
        .dir("/root/a")
        .dir("/root/a/inner")
        .dir("/root/b")
        .file("/root/top.txt", b"top")
        .file("/root/a/one.txt", b"one")
        .file("/root/a/inner/deep.txt", b"deep")
        .file("/root/b/two.txt", b"two")
}

fn scan_memory(gateway: MemoryGateway) -> dircmp_scan::ScanOutcome {
    TreeScanner::with_gateway(gateway, ScanConfig::new("/root"))
        .scan()
        .unwrap()
}

fn relative_paths(outcome: &dircmp_scan::ScanOutcome) -> Vec<String> {
    outcome
        .tree
        .files()
        .map(|(_, f)| f.relative_path())
        .collect()
}

#[test]
fn test_unlistable_directory_keeps_rest_of_tree() {
    let mut gateway = memory_fixture();
    gateway.fail_dir_listing.insert(PathBuf::from("/root/a"));
    gateway.fail_file_listing.insert(PathBuf::from("/root/a"));

    let outcome = scan_memory(gateway);

    assert_eq!(relative_paths(&outcome), vec!["/top.txt", "/b/two.txt"]);
    let dir_failures: Vec<_> = outcome
        .failures
        .iter()
        .filter(|f| f.kind == FailureKind::DirectoryListing)
        .collect();
    assert_eq!(dir_failures.len(), 1);
    assert_eq!(dir_failures[0].path, PathBuf::from("/root/a"));

    // The directory itself is still present, just empty.
    let a = &outcome.tree.root.directories[0];
    assert_eq!(a.name, "a");
    assert!(a.files.is_empty() && a.directories.is_empty());
}

#[test]
fn test_metadata_failure_omits_file() {
    let mut gateway = memory_fixture();
    gateway.fail_stat.insert(PathBuf::from("/root/a/one.txt"));

    let outcome = scan_memory(gateway);

    assert!(outcome.tree.find_file("/a/one.txt").is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].kind, FailureKind::Metadata);
    assert_eq!(outcome.tree.stats.total_files, 3);
}

#[test]
fn test_content_failure_keeps_file_without_checksum() {
    let mut gateway = memory_fixture();
    gateway.fail_read.insert(PathBuf::from("/root/b/two.txt"));

    let outcome = scan_memory(gateway);

    let file = outcome.tree.find_file("/b/two.txt").unwrap();
    assert_eq!(file.size, 3);
    assert_eq!(file.checksum, None);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].kind, FailureKind::ContentRead);
    assert_eq!(outcome.tree.stats.unhashed_files, 1);
}

#[test]
fn test_failures_in_walk_order() {
    let mut gateway = memory_fixture();
    gateway.fail_read.insert(PathBuf::from("/root/top.txt"));
    gateway.fail_stat.insert(PathBuf::from("/root/b/two.txt"));
    gateway.fail_file_listing.insert(PathBuf::from("/root/a/inner"));

    let outcome = scan_memory(gateway);

    let kinds: Vec<_> = outcome.failures.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FailureKind::FileListing,
            FailureKind::Metadata,
            FailureKind::ContentRead
        ]
    );
}

#[test]
fn test_parallel_hashing_matches_sequential() {
    let build = || {
        let mut gateway = memory_fixture();
        gateway.fail_read.insert(PathBuf::from("/root/a/one.txt"));
        gateway.fail_read.insert(PathBuf::from("/root/b/two.txt"));
        gateway
    };

    let sequential = scan_memory(build());
    let config = ScanConfig::builder()
        .root("/root")
        .parallel_hashing(true)
        .threads(3usize)
        .build()
        .unwrap();
    let parallel = TreeScanner::with_gateway(build(), config).scan().unwrap();

    assert_eq!(sequential.tree, parallel.tree);
    assert_eq!(sequential.failures, parallel.failures);
}

#[test]
fn test_scan_real_directory_sorted_and_filtered() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("zeta/alpha")).unwrap();
    fs::create_dir(root.join("beta")).unwrap();
    fs::write(root.join("b.txt"), "b").unwrap();
    fs::write(root.join("a.txt"), "a").unwrap();
    fs::write(root.join("THUMBS.db"), "x").unwrap();
    fs::write(root.join("zeta/.ds_store"), "x").unwrap();
    fs::write(root.join("zeta/alpha/Thumbs.db"), "x").unwrap();
    fs::write(root.join("zeta/alpha/c.bin"), [1u8, 2, 3]).unwrap();

    let outcome = TreeScanner::new(ScanConfig::new(root)).scan().unwrap();

    assert!(!outcome.has_failures());
    assert_eq!(
        relative_paths(&outcome),
        vec!["/a.txt", "/b.txt", "/zeta/alpha/c.bin"]
    );
    let dir_names: Vec<_> = outcome
        .tree
        .root
        .directories
        .iter()
        .map(|d| d.name.to_string())
        .collect();
    assert_eq!(dir_names, vec!["beta", "zeta"]);
    assert_eq!(
        outcome.tree.find_file("/zeta/alpha/c.bin").unwrap().checksum,
        Some(ChecksumEngine::checksum_bytes(&[1, 2, 3]))
    );
}

#[test]
fn test_rescan_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("x/y")).unwrap();
    fs::write(root.join("x/y/file.dat"), vec![7u8; 10_000]).unwrap();
    fs::write(root.join("x/other.dat"), "other").unwrap();
    fs::write(root.join("readme"), "hello").unwrap();

    let scanner = TreeScanner::new(ScanConfig::new(root));
    let first = serde_json::to_string(&scanner.scan().unwrap().tree).unwrap();
    let second = serde_json::to_string(&scanner.scan().unwrap().tree).unwrap();

    assert_eq!(first, second);
    assert!(!first.contains(&*root.to_string_lossy()));
}

#[test]
fn test_small_chunks_same_checksums() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("data.bin"), vec![42u8; 100_000]).unwrap();

    let default = TreeScanner::new(ScanConfig::new(temp.path())).scan().unwrap();
    let tiny_config = ScanConfig::builder()
        .root(temp.path())
        .chunk_size(13usize)
        .build()
        .unwrap();
    let tiny = TreeScanner::new(tiny_config).scan().unwrap();

    assert_eq!(default.tree, tiny.tree);
}

#[test]
fn test_unlistable_subdirectories_keep_own_files() {
    let mut gateway = memory_fixture();
    gateway.fail_dir_listing.insert(PathBuf::from("/root/a"));

    let outcome = scan_memory(gateway);

    assert_eq!(
        relative_paths(&outcome),
        vec!["/top.txt", "/a/one.txt", "/b/two.txt"]
    );
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].kind, FailureKind::DirectoryListing);
    assert_eq!(outcome.failures[0].path, PathBuf::from("/root/a"));
    assert!(outcome.tree.find_file("/a/one.txt").unwrap().checksum.is_some());
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_names_are_hashed_and_distinct() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join(OsStr::from_bytes(b"bad\xffname.txt")), "data").unwrap();
    fs::write(root.join(OsStr::from_bytes(b"x\xfe")), "fe").unwrap();
    fs::write(root.join(OsStr::from_bytes(b"x\xff")), "ff").unwrap();

    let outcome = TreeScanner::new(ScanConfig::new(root)).scan().unwrap();

    assert!(!outcome.has_failures(), "{:?}", outcome.failures);
    assert_eq!(
        relative_paths(&outcome),
        vec!["/bad\\xFFname.txt", "/x\\xFE", "/x\\xFF"]
    );
    let file = outcome.tree.find_file("/bad\\xFFname.txt").unwrap();
    assert_eq!(file.checksum, Some(ChecksumEngine::checksum_bytes(b"data")));
    assert_eq!(outcome.tree.stats.hashed_files, 3);
}

#[cfg(unix)]
#[test]
fn test_followed_link_cycle_is_a_listing_failure() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("f.txt"), "f").unwrap();
    std::os::unix::fs::symlink(".", root.join("loop")).unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    std::os::unix::fs::symlink("..", root.join("sub/back")).unwrap();

    let config = ScanConfig::builder()
        .root(root)
        .follow_symlinks(true)
        .build()
        .unwrap();
    let outcome = TreeScanner::new(config).scan().unwrap();

    assert_eq!(relative_paths(&outcome), vec!["/f.txt"]);
    let cycles: Vec<_> = outcome.failures.iter().map(|f| f.path.clone()).collect();
    assert_eq!(cycles, vec![root.join("loop"), root.join("sub/back")]);
    assert!(
        outcome
            .failures
            .iter()
            .all(|f| f.kind == FailureKind::DirectoryListing)
    );
}

#[cfg(unix)]
#[test]
fn test_followed_link_to_sibling_is_walked() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("real")).unwrap();
    fs::write(root.join("real/x.txt"), "x").unwrap();
    std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

    let config = ScanConfig::builder()
        .root(root)
        .follow_symlinks(true)
        .build()
        .unwrap();
    let outcome = TreeScanner::new(config).scan().unwrap();

    assert!(!outcome.has_failures());
    assert_eq!(relative_paths(&outcome), vec!["/alias/x.txt", "/real/x.txt"]);
}
