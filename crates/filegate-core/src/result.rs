//! Progress snapshots and final scan results.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::FileRecord;

/// Point-in-time copy of scan progress.
///
/// Snapshots are deep copies; holding one never blocks the running scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Entries discovered (files and directories).
    pub total_files: u64,
    /// Files classified by the worker pool.
    pub scanned_files: u64,
    /// Bytes discovered.
    pub total_size: u64,
    /// Bytes classified by the worker pool.
    pub scanned_size: u64,
    /// Entries marked blocked.
    pub blocked_files: u64,
    /// Error messages in the order they were recorded.
    pub errors: Vec<String>,
    /// When the scan started.
    pub started_at: DateTime<Utc>,
    /// When a result last arrived at the collector.
    pub last_updated: Option<DateTime<Utc>>,
    /// Directory of the most recently collected entry.
    pub current_directory: PathBuf,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            total_files: 0,
            scanned_files: 0,
            total_size: 0,
            scanned_size: 0,
            blocked_files: 0,
            errors: Vec::new(),
            started_at,
            last_updated: None,
            current_directory: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.scanned_files as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate scan rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.scanned_size as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Number of errors recorded so far.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Terminal artifact of a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Root path that was scanned.
    pub root: PathBuf,
    /// Every record, in arrival order at the collector.
    pub files: Vec<FileRecord>,
    /// Progress frozen at completion.
    pub progress: ScanProgress,
    /// Wall time of the scan.
    pub duration: Duration,
    /// True iff no errors were recorded.
    pub success: bool,
    /// Top-level error, e.g. when the scan was cancelled.
    pub error: Option<String>,
}

impl ScanResult {
    /// Iterate over blocked records.
    pub fn blocked(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.is_blocked)
    }

    /// Number of directory records.
    pub fn directory_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_dir).count()
    }

    /// Total size of blocked records in bytes.
    pub fn blocked_size(&self) -> u64 {
        self.blocked().map(|f| f.size).sum()
    }

    /// Append an error after the fact and keep `success` consistent with it.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.progress.errors.push(message.into());
        self.success = false;
    }
}
