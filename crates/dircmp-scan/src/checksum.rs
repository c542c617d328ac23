//! Streaming CRC-32 over file content.
//!
//! Standard reflected CRC-32 (polynomial `0xEDB88320`, the one used by
//! Ethernet and ZIP): register starts at `0xFFFFFFFF`, the result is the
//! one's complement of the final register. Output does not depend on how
//! the input is chunked.

use std::io::{self, Read};
use std::path::Path;
use std::sync::LazyLock;

use dircmp_core::{DEFAULT_CHUNK_SIZE, ScanFailure};

use crate::gateway::FileSystemGateway;

const POLYNOMIAL: u32 = 0xEDB8_8320;

static TABLE: LazyLock<[u32; 256]> = LazyLock::new(|| {
    let mut table = [0u32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut crc = i as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                POLYNOMIAL ^ (crc >> 1)
            } else {
                crc >> 1
            };
        }
        *slot = crc;
    }
    table
});

/// Incremental CRC-32 hasher.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Create a hasher with the initial register.
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    /// Feed bytes into the hasher.
    pub fn update(&mut self, bytes: &[u8]) {
        let table = &*TABLE;
        let mut crc = self.state;
        for &b in bytes {
            crc = table[((crc ^ u32::from(b)) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.state = crc;
    }

    /// Final checksum.
    pub fn finalize(self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes content checksums by streaming reads in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumEngine {
    chunk_size: usize,
}

impl ChecksumEngine {
    /// Create an engine reading `chunk_size` bytes at a time.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Checksum an in-memory buffer.
    pub fn checksum_bytes(bytes: &[u8]) -> u32 {
        let mut hasher = Crc32::new();
        hasher.update(bytes);
        hasher.finalize()
    }

    /// Checksum everything a reader yields.
    pub fn checksum_reader<R: Read>(&self, reader: R) -> io::Result<u32> {
        self.checksum_reader_with(reader, |_| {})
    }

    /// Checksum a reader, calling `on_chunk` with the size of every chunk
    /// consumed.
    pub fn checksum_reader_with<R, F>(&self, mut reader: R, mut on_chunk: F) -> io::Result<u32>
    where
        R: Read,
        F: FnMut(usize),
    {
        let mut hasher = Crc32::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
            on_chunk(read);
        }

        Ok(hasher.finalize())
    }

    /// Checksum a file opened through `gateway`.
    pub fn checksum_file<G>(&self, gateway: &G, path: &Path) -> Result<u32, ScanFailure>
    where
        G: FileSystemGateway + ?Sized,
    {
        let reader = gateway.open_file(path)?;
        self.checksum_reader(reader)
            .map_err(|e| ScanFailure::content_read(path, &e))
    }
}

impl Default for ChecksumEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(ChecksumEngine::checksum_bytes(b""), 0);
        assert_eq!(ChecksumEngine::checksum_bytes(b"123456789"), 0xCBF4_3926);
        assert_eq!(
            ChecksumEngine::checksum_bytes(b"The quick brown fox jumps over the lazy dog"),
            0x414F_A339
        );
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(TABLE[0], 0);
        assert_eq!(TABLE[1], 0x7707_3096);
        assert_eq!(TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_chunk_size_does_not_matter() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let expected = ChecksumEngine::checksum_bytes(&data);

        for chunk in [1, 7, 4096, 1 << 20] {
            let engine = ChecksumEngine::new(chunk);
            assert_eq!(engine.checksum_reader(&data[..]).unwrap(), expected);
        }
    }

    #[test]
    fn test_incremental_update() {
        let mut hasher = Crc32::new();
        hasher.update(b"12345");
        hasher.update(b"6789");
        assert_eq!(hasher.finalize(), 0xCBF4_3926);
    }

    #[test]
    fn test_on_chunk_reports_all_bytes() {
        let engine = ChecksumEngine::new(4);
        let mut seen = 0;
        engine
            .checksum_reader_with(&b"0123456789"[..], |n| seen += n)
            .unwrap();
        assert_eq!(seen, 10);
    }

    #[test]
    fn test_read_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk gone"))
            }
        }

        let err = ChecksumEngine::default().checksum_reader(Broken).unwrap_err();
        assert_eq!(err.to_string(), "disk gone");
    }
}
