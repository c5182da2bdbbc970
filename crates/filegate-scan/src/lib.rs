//! Concurrent file scanning engine for filegate.
//!
//! # Overview
//!
//! `filegate-scan` walks a directory tree, sniffs and classifies every file
//! against the configured blocking rules, and reports progress while it runs.
//! The pipeline has three stages connected by bounded queues:
//!
//! - **Traversal**: one task per directory, feeding file paths to the work queue
//! - **Worker pool**: a fixed number of workers that stat, sniff and classify
//! - **Collector**: a single task that owns the record list and the error log
//!
//! # Example
//!
//! ```rust,no_run
//! use filegate_scan::{ScanConfig, Scanner};
//!
//! # async fn run() -> Result<(), filegate_scan::ScanError> {
//! let config = ScanConfig::builder()
//!     .max_file_size_mb(10u64)
//!     .blocked_patterns(vec!["*.tmp".to_string()])
//!     .build()
//!     .expect("valid config");
//!
//! let scanner = Scanner::new(config);
//! let result = scanner.scan("/path/to/scan").await?;
//!
//! println!("Scanned {} entries", result.files.len());
//! println!("Blocked {} entries", result.progress.blocked_files);
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! Poll [`Scanner::progress`] from any task, or subscribe to pushed snapshots:
//!
//! ```rust,no_run
//! use filegate_scan::{ScanConfig, Scanner};
//!
//! let scanner = Scanner::new(ScanConfig::default());
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Scanned {} files", progress.scanned_files);
//!     }
//! });
//! ```

mod classify;
mod collector;
mod progress;
mod registry;
mod scanner;
mod sniff;
mod traversal;
mod worker;

pub use classify::Classifier;
pub use collector::PROGRESS_INTERVAL;
pub use registry::{ScanRegistry, ScanStatus};
pub use scanner::{ScanState, Scanner};
pub use sniff::{SNIFF_LEN, detect_content_type, file_type_label};

// Re-export core types for convenience
pub use filegate_core::{
    BlockReason, EXPORT_FILE_NAME, FileRecord, ScanConfig, ScanError, ScanProgress, ScanResult,
};
pub use filegate_export::{BlockedFilesExporter, ExportError, JsonExporter};
