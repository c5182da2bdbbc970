//! Blocked-file manifest export for filegate.
//!
//! The scanner hands its final [`ScanResult`] to a [`BlockedFilesExporter`]
//! when export-on-completion is enabled. [`JsonExporter`] is the default
//! implementation and writes a pretty-printed [`BlockedManifest`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use filegate_core::{FileRecord, ScanResult};

/// Errors raised while writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output file could not be written.
    #[error("failed to write output file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be encoded.
    #[error("failed to encode manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Summary of blocked files written on export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedManifest {
    /// When the manifest was produced.
    pub timestamp: DateTime<Utc>,
    /// Entries discovered by the scan.
    pub total_files: u64,
    /// Every blocked record.
    pub blocked_files: Vec<FileRecord>,
    /// Scan wall time in seconds.
    pub scan_duration_secs: f64,
    /// Number of blocked records.
    pub blocked_count: u64,
    /// Bytes discovered by the scan.
    pub total_size: u64,
    /// Bytes held by blocked records.
    pub blocked_size: u64,
}

impl BlockedManifest {
    /// Build a manifest from a finished scan.
    pub fn from_result(result: &ScanResult) -> Self {
        let blocked_files: Vec<FileRecord> = result.blocked().cloned().collect();
        let blocked_size = blocked_files.iter().map(|f| f.size).sum();

        Self {
            timestamp: Utc::now(),
            total_files: result.progress.total_files,
            blocked_count: blocked_files.len() as u64,
            blocked_files,
            scan_duration_secs: result.duration.as_secs_f64(),
            total_size: result.progress.total_size,
            blocked_size,
        }
    }
}

/// Destination for the blocked-file report of a finished scan.
pub trait BlockedFilesExporter: Send + Sync {
    /// Write the report for `result` to `output`.
    fn export(&self, result: &ScanResult, output: &Path) -> Result<(), ExportError>;
}

/// Writes a [`BlockedManifest`] as pretty JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter;

impl JsonExporter {
    /// Create a new JSON exporter.
    pub fn new() -> Self {
        Self
    }
}

impl BlockedFilesExporter for JsonExporter {
    fn export(&self, result: &ScanResult, output: &Path) -> Result<(), ExportError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ExportError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let manifest = BlockedManifest::from_result(result);
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(output, json).map_err(|source| ExportError::Write {
            path: output.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %output.display(),
            blocked = manifest.blocked_count,
            "exported blocked files"
        );
        Ok(())
    }
}
