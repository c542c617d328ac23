//! Typed wrapper over raw filesystem calls.
//!
//! The scanner only talks to the filesystem through [`FileSystemGateway`],
//! which turns every I/O error into a [`ScanFailure`] carrying the failing
//! path. [`LocalGateway`] is the `std::fs` implementation.

use std::ffi::OsStr;
use std::fs::{self, File, FileType};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use dircmp_core::ScanFailure;

/// File names excluded from every listing, compared ASCII case-insensitively.
pub const PLATFORM_ARTIFACTS: [&str; 2] = ["Thumbs.db", ".DS_Store"];

/// Check whether a file name is an OS-generated artifact that is never
/// part of a scanned tree.
pub fn is_platform_artifact(name: &str) -> bool {
    PLATFORM_ARTIFACTS
        .iter()
        .any(|artifact| artifact.eq_ignore_ascii_case(name))
}

/// Last component of `path` as it appears in relative paths.
///
/// UTF-8 names without a backslash are used as they are. In any other name
/// `\` becomes `\\` and every byte outside valid UTF-8 becomes `\xHH`, so
/// two distinct on-disk names never share a relative path.
pub fn entry_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => encode_name(name),
        None => path.to_string_lossy().into_owned(),
    }
}

#[cfg(unix)]
fn encode_name(name: &OsStr) -> String {
    use std::os::unix::ffi::OsStrExt;

    let bytes = name.as_bytes();
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.contains('\\') => text.to_string(),
        _ => escape_name_bytes(bytes),
    }
}

// Other platforms hand out UTF-16 names; unpaired surrogates stay lossy.
#[cfg(not(unix))]
fn encode_name(name: &OsStr) -> String {
    name.to_string_lossy().into_owned()
}

#[cfg_attr(not(unix), allow(dead_code))]
fn escape_name_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            if c == '\\' {
                out.push_str("\\\\");
            } else {
                out.push(c);
            }
        }
        for byte in chunk.invalid() {
            out.push_str(&format!("\\x{byte:02X}"));
        }
    }
    out
}

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Nothing exists at the path.
    Missing,
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Sockets, devices and the like.
    Other,
}

/// Filesystem operations needed by scanning and pair comparison.
///
/// Implementations are stateless from the caller's point of view and must
/// be usable from several hashing threads at once.
pub trait FileSystemGateway: Send + Sync {
    /// Absolute paths of the subdirectories of `dir`.
    fn list_subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanFailure>;

    /// Absolute paths of the regular files in `dir`, without platform
    /// artifacts.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanFailure>;

    /// Size of a file in bytes.
    fn stat_file(&self, path: &Path) -> Result<u64, ScanFailure>;

    /// Open a file for streaming its content.
    fn open_file(&self, path: &Path) -> Result<Box<dyn Read + Send>, ScanFailure>;

    /// Determine what exists at `path`.
    fn probe(&self, path: &Path) -> io::Result<PathKind>;

    /// Resolved identity of the directory at `dir`, used to stop the walk
    /// from re-entering an enclosing directory. `None` when links are not
    /// followed or the identity is unknown.
    fn directory_identity(&self, _dir: &Path) -> Option<PathBuf> {
        None
    }
}

/// Gateway backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGateway {
    follow_symlinks: bool,
}

impl LocalGateway {
    /// Create a gateway. Symbolic links are skipped unless
    /// `follow_symlinks` is set, in which case they are resolved to their
    /// target's kind.
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }

    /// List `dir`, keeping the entries whose resolved type passes `keep`.
    fn list_entries(
        &self,
        dir: &Path,
        keep: impl Fn(&FileType) -> bool,
    ) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let mut file_type = entry.file_type()?;
            if file_type.is_symlink() {
                if !self.follow_symlinks {
                    continue;
                }
                // Dangling links resolve to nothing and are dropped.
                match fs::metadata(entry.path()) {
                    Ok(meta) => file_type = meta.file_type(),
                    Err(_) => continue,
                }
            }
            if keep(&file_type) {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl FileSystemGateway for LocalGateway {
    fn list_subdirectories(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanFailure> {
        self.list_entries(dir, FileType::is_dir)
            .map_err(|e| ScanFailure::directory_listing(dir, &e))
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanFailure> {
        let mut files = self
            .list_entries(dir, FileType::is_file)
            .map_err(|e| ScanFailure::file_listing(dir, &e))?;
        files.retain(|path| {
            path.file_name()
                .is_none_or(|name| !is_platform_artifact(&name.to_string_lossy()))
        });
        Ok(files)
    }

    fn stat_file(&self, path: &Path) -> Result<u64, ScanFailure> {
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|e| ScanFailure::metadata(path, &e))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn Read + Send>, ScanFailure> {
        let file = File::open(path).map_err(|e| ScanFailure::content_read(path, &e))?;
        Ok(Box::new(file))
    }

    fn probe(&self, path: &Path) -> io::Result<PathKind> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(PathKind::Directory),
            Ok(meta) if meta.is_file() => Ok(PathKind::File),
            Ok(_) => Ok(PathKind::Other),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PathKind::Missing),
            Err(e) => Err(e),
        }
    }

    fn directory_identity(&self, dir: &Path) -> Option<PathBuf> {
        if !self.follow_symlinks {
            return None;
        }
        fs::canonicalize(dir).ok()
    }
}
