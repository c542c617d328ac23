//! Scan progress reporting.
//!
//! The scanner owns a [`ProgressState`] and only ever increments its
//! counters. A [`ProgressTicker`] reads the state on a fixed interval and
//! hands [`ScanProgress`] snapshots to a [`ProgressSink`]; it never touches
//! the tree being built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use strum::Display;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Stage of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScanPhase {
    /// No scan running yet.
    Idle,
    /// Phase A: listing directories and reading file sizes.
    Listing,
    /// Phase B: checksumming file contents.
    Hashing,
    /// Scan finished.
    Done,
}

impl ScanPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Listing,
            2 => Self::Hashing,
            3 => Self::Done,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Listing => 1,
            Self::Hashing => 2,
            Self::Done => 3,
        }
    }
}

/// Point-in-time view of a running scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// Current phase.
    pub phase: ScanPhase,
    /// Files listed (Phase A) or hashed (Phase B) so far.
    pub current_count: u64,
    /// Files to hash; unknown while listing.
    pub total_count: Option<u64>,
    /// Bytes listed or hashed so far.
    pub current_bytes: u64,
    /// Bytes to hash; unknown while listing.
    pub total_bytes: Option<u64>,
    /// Directories entered so far.
    pub dirs_scanned: u64,
    /// Failures recorded so far.
    pub failures: u64,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
    /// File that has been in progress longer than the slow-file threshold.
    pub slow_file: Option<PathBuf>,
}

impl ScanProgress {
    /// Completion ratio in percent, by bytes when known, else by count.
    pub fn percentage(&self) -> Option<f64> {
        match (self.total_bytes, self.total_count) {
            (Some(total), _) if total > 0 => {
                Some(self.current_bytes as f64 / total as f64 * 100.0)
            }
            (_, Some(total)) if total > 0 => {
                Some(self.current_count as f64 / total as f64 * 100.0)
            }
            (Some(_), _) | (_, Some(_)) => Some(100.0),
            _ => None,
        }
    }
}

/// Ticket handed out by [`ProgressState::begin_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct FileTicket(u64);

#[derive(Debug)]
struct Timing {
    started: Instant,
    next_ticket: u64,
    // Keyed by ticket, so the first entry is the oldest file in flight.
    in_flight: BTreeMap<FileTicket, (PathBuf, Instant)>,
}

/// Live counters of one scanner, shared with the reporting task.
#[derive(Debug)]
pub struct ProgressState {
    phase: AtomicU8,
    files_seen: AtomicU64,
    bytes_seen: AtomicU64,
    dirs_seen: AtomicU64,
    files_hashed: AtomicU64,
    bytes_hashed: AtomicU64,
    failures: AtomicU64,
    timing: Mutex<Timing>,
}

impl ProgressState {
    /// Create idle state.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ScanPhase::Idle.as_u8()),
            files_seen: AtomicU64::new(0),
            bytes_seen: AtomicU64::new(0),
            dirs_seen: AtomicU64::new(0),
            files_hashed: AtomicU64::new(0),
            bytes_hashed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timing: Mutex::new(Timing {
                started: Instant::now(),
                next_ticket: 0,
                in_flight: BTreeMap::new(),
            }),
        }
    }

    /// Zero all counters and restart the clock.
    pub fn reset(&self) {
        for counter in [
            &self.files_seen,
            &self.bytes_seen,
            &self.dirs_seen,
            &self.files_hashed,
            &self.bytes_hashed,
            &self.failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.set_phase(ScanPhase::Idle);
        let mut timing = self.timing();
        timing.started = Instant::now();
        timing.in_flight.clear();
    }

    /// Current phase.
    pub fn phase(&self) -> ScanPhase {
        ScanPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: ScanPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    pub(crate) fn record_file_seen(&self, size: u64) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
        self.bytes_seen.fetch_add(size, Ordering::Relaxed);
    }

    pub(crate) fn record_dir(&self) {
        self.dirs_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn begin_file(&self, path: &Path) -> FileTicket {
        let mut timing = self.timing();
        let ticket = FileTicket(timing.next_ticket);
        timing.next_ticket += 1;
        timing
            .in_flight
            .insert(ticket, (path.to_path_buf(), Instant::now()));
        ticket
    }

    pub(crate) fn add_bytes_hashed(&self, bytes: u64) {
        self.bytes_hashed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn finish_file(&self, ticket: FileTicket) {
        self.timing().in_flight.remove(&ticket);
        self.files_hashed.fetch_add(1, Ordering::Relaxed);
    }

    /// Files listed in Phase A.
    pub fn files_seen(&self) -> u64 {
        self.files_seen.load(Ordering::Relaxed)
    }

    /// Files checksummed (or attempted) in Phase B.
    pub fn files_hashed(&self) -> u64 {
        self.files_hashed.load(Ordering::Relaxed)
    }

    /// Take a snapshot. The oldest file still in progress is reported in
    /// [`ScanProgress::slow_file`] once it has run for `slow_threshold`.
    pub fn snapshot(&self, slow_threshold: Duration) -> ScanProgress {
        let phase = self.phase();
        let files_seen = self.files_seen.load(Ordering::Relaxed);
        let bytes_seen = self.bytes_seen.load(Ordering::Relaxed);

        let (current_count, total_count, current_bytes, total_bytes) = match phase {
            ScanPhase::Idle | ScanPhase::Listing => (files_seen, None, bytes_seen, None),
            ScanPhase::Hashing | ScanPhase::Done => (
                self.files_hashed.load(Ordering::Relaxed),
                Some(files_seen),
                self.bytes_hashed.load(Ordering::Relaxed),
                Some(bytes_seen),
            ),
        };

        let timing = self.timing();
        let slow_file = match (timing.in_flight.first_key_value(), phase) {
            (Some((_, (path, since))), ScanPhase::Hashing)
                if since.elapsed() >= slow_threshold =>
            {
                Some(path.clone())
            }
            _ => None,
        };

        ScanProgress {
            phase,
            current_count,
            total_count,
            current_bytes,
            total_bytes,
            dirs_scanned: self.dirs_seen.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            elapsed: timing.started.elapsed(),
            slow_file,
        }
    }

    fn timing(&self) -> std::sync::MutexGuard<'_, Timing> {
        // Timing holds plain values, so a poisoned lock is still usable.
        self.timing.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

/// Reporting cadence.
#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    /// Time between snapshots.
    pub interval: Duration,
    /// In-progress time after which a file is named in snapshots.
    pub slow_file_threshold: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            slow_file_threshold: Duration::from_secs(5),
        }
    }
}

/// Receiver of periodic progress snapshots.
pub trait ProgressSink: Send + 'static {
    /// Called once per tick.
    fn report(&mut self, progress: &ScanProgress);

    /// Called once after the ticker is stopped, with a final snapshot.
    fn finish(&mut self, _last: &ScanProgress) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(&ScanProgress) + Send + 'static,
{
    fn report(&mut self, progress: &ScanProgress) {
        self(progress)
    }
}

/// Timer-driven task that samples a [`ProgressState`].
pub struct ProgressTicker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    /// Spawn the reporting task on the current tokio runtime.
    pub fn spawn<S: ProgressSink>(
        state: Arc<ProgressState>,
        config: ProgressConfig,
        mut sink: S,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        sink.report(&state.snapshot(config.slow_file_threshold));
                    }
                }
            }

            sink.finish(&state.snapshot(config.slow_file_threshold));
        });

        Self { cancel, handle }
    }

    /// Stop ticking and wait for the final snapshot to be delivered.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            tracing::debug!(error = %err, "progress task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_snapshot_has_no_totals() {
        let state = ProgressState::new();
        state.set_phase(ScanPhase::Listing);
        state.record_file_seen(100);
        state.record_file_seen(50);

        let snap = state.snapshot(Duration::from_secs(5));
        assert_eq!(snap.phase, ScanPhase::Listing);
        assert_eq!(snap.current_count, 2);
        assert_eq!(snap.current_bytes, 150);
        assert_eq!(snap.total_count, None);
        assert_eq!(snap.percentage(), None);
    }

    #[test]
    fn test_hashing_snapshot_uses_listing_totals() {
        let state = ProgressState::new();
        state.set_phase(ScanPhase::Listing);
        state.record_file_seen(100);
        state.record_file_seen(100);
        state.set_phase(ScanPhase::Hashing);
        let ticket = state.begin_file(Path::new("/a"));
        state.add_bytes_hashed(50);
        state.finish_file(ticket);

        let snap = state.snapshot(Duration::from_secs(5));
        assert_eq!(snap.current_count, 1);
        assert_eq!(snap.total_count, Some(2));
        assert_eq!(snap.total_bytes, Some(200));
        assert_eq!(snap.percentage(), Some(25.0));
    }

    #[test]
    fn test_slow_file_reported_after_threshold() {
        let state = ProgressState::new();
        state.set_phase(ScanPhase::Hashing);
        state.begin_file(Path::new("/big.iso"));

        assert_eq!(state.snapshot(Duration::from_secs(60)).slow_file, None);
        assert_eq!(
            state.snapshot(Duration::ZERO).slow_file,
            Some(PathBuf::from("/big.iso"))
        );
    }

    #[test]
    fn test_finished_file_is_never_slow() {
        let state = ProgressState::new();
        state.set_phase(ScanPhase::Hashing);

        let big = state.begin_file(Path::new("/big.iso"));
        let small = state.begin_file(Path::new("/small.txt"));
        state.finish_file(small);
        assert_eq!(
            state.snapshot(Duration::ZERO).slow_file,
            Some(PathBuf::from("/big.iso"))
        );

        // A file started later is younger than one still running.
        let late = state.begin_file(Path::new("/late.bin"));
        assert_eq!(
            state.snapshot(Duration::ZERO).slow_file,
            Some(PathBuf::from("/big.iso"))
        );

        state.finish_file(big);
        state.finish_file(late);
        assert_eq!(state.snapshot(Duration::ZERO).slow_file, None);
    }

    #[test]
    fn test_reset() {
        let state = ProgressState::new();
        state.set_phase(ScanPhase::Done);
        state.record_file_seen(10);
        state.record_failure();
        state.reset();

        let snap = state.snapshot(Duration::ZERO);
        assert_eq!(snap.phase, ScanPhase::Idle);
        assert_eq!(snap.current_count, 0);
        assert_eq!(snap.failures, 0);
    }

    #[tokio::test]
    async fn test_ticker_reports_and_finishes() {
        let state = Arc::new(ProgressState::new());
        state.set_phase(ScanPhase::Listing);
        state.record_file_seen(1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let config = ProgressConfig {
            interval: Duration::from_millis(5),
            slow_file_threshold: Duration::from_secs(5),
        };

        let ticker = ProgressTicker::spawn(Arc::clone(&state), config, move |p: &ScanProgress| {
            sink_seen.lock().unwrap().push(p.current_count);
        });
        tokio::time::sleep(Duration::from_millis(40)).await;
        ticker.stop().await;

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&count| count == 1));
    }
}
