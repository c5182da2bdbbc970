//! Shared progress accumulator.
//!
//! Counters are lock-free atomics bumped by every worker and traversal task.
//! The error log, last-update time and current directory sit behind a single
//! mutex so a multi-field update is never split across locks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};

use filegate_core::ScanProgress;

#[derive(Debug, Default)]
struct SharedState {
    errors: Vec<String>,
    last_updated: Option<DateTime<Utc>>,
    current_directory: PathBuf,
}

/// Thread-safe progress state for one scan.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    started_at: DateTime<Utc>,
    start: Instant,
    total_files: AtomicU64,
    scanned_files: AtomicU64,
    total_size: AtomicU64,
    scanned_size: AtomicU64,
    blocked_files: AtomicU64,
    shared: Mutex<SharedState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
            total_files: AtomicU64::new(0),
            scanned_files: AtomicU64::new(0),
            total_size: AtomicU64::new(0),
            scanned_size: AtomicU64::new(0),
            blocked_files: AtomicU64::new(0),
            shared: Mutex::new(SharedState::default()),
        }
    }

    /// Record a newly discovered entry of `size` bytes.
    pub fn record_discovered(&self, size: u64) {
        self.total_files.fetch_add(1, Ordering::Relaxed);
        self.total_size.fetch_add(size, Ordering::Relaxed);
    }

    /// Record a file the worker pool finished classifying.
    pub fn record_processed(&self, size: u64) {
        self.scanned_files.fetch_add(1, Ordering::Relaxed);
        self.scanned_size.fetch_add(size, Ordering::Relaxed);
    }

    pub fn record_blocked(&self) {
        self.blocked_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Append an error message and touch the update time.
    pub fn record_error(&self, message: String) {
        let mut shared = self.lock();
        shared.errors.push(message);
        shared.last_updated = Some(Utc::now());
    }

    /// Note that a record from `directory` just arrived.
    pub fn record_arrival(&self, directory: &Path) {
        let mut shared = self.lock();
        shared.last_updated = Some(Utc::now());
        if shared.current_directory != directory {
            shared.current_directory = directory.to_path_buf();
        }
    }

    /// Deep copy of the current progress.
    pub fn snapshot(&self) -> ScanProgress {
        let shared = self.lock();
        ScanProgress {
            total_files: self.total_files.load(Ordering::Relaxed),
            scanned_files: self.scanned_files.load(Ordering::Relaxed),
            total_size: self.total_size.load(Ordering::Relaxed),
            scanned_size: self.scanned_size.load(Ordering::Relaxed),
            blocked_files: self.blocked_files.load(Ordering::Relaxed),
            errors: shared.errors.clone(),
            started_at: self.started_at,
            last_updated: shared.last_updated,
            current_directory: shared.current_directory.clone(),
            elapsed: self.start.elapsed(),
        }
    }

    /// Time since the tracker was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
