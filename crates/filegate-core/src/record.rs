//! Per-entry scan records.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Name of the manifest written into the scanned root on export.
///
/// Files with this name are skipped during traversal when export is enabled,
/// so a rescan never ingests its own output.
pub const EXPORT_FILE_NAME: &str = "blocked_files.json";

/// Why an entry was blocked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BlockReason {
    /// Larger than the configured size limit.
    SizeExceedsLimit,
    /// Extension missing from a non-empty allow-list.
    TypeNotAllowed,
    /// Base name matched a blocked glob pattern.
    MatchesPattern { pattern: String },
    /// The entry could not be read, so it could not be classified.
    Unreadable,
    /// Blocked, but no rule explains it.
    Unknown,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeExceedsLimit => write!(f, "File size exceeds limit"),
            Self::TypeNotAllowed => write!(f, "File type not allowed"),
            Self::MatchesPattern { pattern } => {
                write!(f, "File matches blocked pattern: {pattern}")
            }
            Self::Unreadable => write!(f, "File could not be read"),
            Self::Unknown => write!(f, "Unknown reason"),
        }
    }
}

/// Classified metadata for one file system entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path.
    pub path: PathBuf,
    /// Base name.
    pub name: CompactString,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Sniffed MIME type (empty when not sniffed).
    pub mime_type: String,
    /// Extension without the dot, or the primary MIME token when there is none.
    pub file_type: String,
    /// Lowercase extension including the leading dot (empty when none).
    pub extension: String,
    /// Last modification time, when known.
    pub modified: Option<DateTime<Utc>>,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Whether a blocking rule (or the unreadable policy) applies.
    pub is_blocked: bool,
    /// Present iff `is_blocked`.
    pub block_reason: Option<BlockReason>,
    /// Present iff metadata or content could not be read.
    pub access_error: Option<String>,
}

impl FileRecord {
    fn empty(path: PathBuf, is_dir: bool) -> Self {
        let name = base_name(&path);
        Self {
            path,
            name,
            size: 0,
            mime_type: String::new(),
            file_type: String::new(),
            extension: String::new(),
            modified: None,
            is_dir,
            is_blocked: false,
            block_reason: None,
            access_error: None,
        }
    }

    /// Create a file record with only the path filled in.
    pub fn new_file(path: impl Into<PathBuf>) -> Self {
        let mut record = Self::empty(path.into(), false);
        record.extension = lowercase_extension(&record.path);
        record
    }

    /// Create a directory record.
    pub fn new_directory(path: impl Into<PathBuf>, modified: Option<DateTime<Utc>>) -> Self {
        let mut record = Self::empty(path.into(), true);
        record.modified = modified;
        record
    }

    /// Mark this record as blocked for the given reason.
    pub fn block(&mut self, reason: BlockReason) {
        self.is_blocked = true;
        self.block_reason = Some(reason);
    }

    /// Attach an access error. Unreadable entries are blocked by policy
    /// unless a rule already blocked them.
    pub fn mark_inaccessible(&mut self, error: impl fmt::Display) {
        self.access_error = Some(error.to_string());
        if !self.is_blocked {
            self.block(BlockReason::Unreadable);
        }
    }

    /// Directory containing this entry.
    pub fn parent_dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// A queued file path awaiting classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Path of the entry.
    pub path: PathBuf,
    /// Whether the entry is a directory. Only files are queued by the traversal.
    pub is_dir: bool,
}

impl WorkItem {
    /// Create a work item for a file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }
}

fn base_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
