//! Core types for filegate.
//!
//! This crate provides the data model shared by the scanner, the exporter
//! and the CLI: scan configuration, per-entry records, progress snapshots
//! and the final scan result.

mod config;
mod error;
mod record;
mod result;

pub use config::{
    DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_COUNT, MAX_CAPACITY,
    ScanConfig, ScanConfigBuilder,
};
pub use error::ScanError;
pub use record::{BlockReason, EXPORT_FILE_NAME, FileRecord, WorkItem};
pub use result::{ScanProgress, ScanResult};
