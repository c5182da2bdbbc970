//! Registry of background scans keyed by root path.
//!
//! This is the contract an outer transport (HTTP handlers, an RPC service)
//! sits on: start a scan, then poll its status until it completes. Status
//! reads only take a map shard lock and a progress snapshot, so polling
//! never blocks a running scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::info;

use filegate_core::{ScanConfig, ScanError, ScanProgress, ScanResult};

use crate::scanner::Scanner;

/// Externally visible status of a registered scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanStatus {
    Running { progress: ScanProgress },
    Completed { result: ScanResult },
    Error { message: String },
    NotFound,
}

enum Slot {
    Running(Arc<Scanner>),
    Completed(Arc<ScanResult>),
    Failed(String),
}

/// Concurrent registry of scans. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct ScanRegistry {
    scans: Arc<DashMap<PathBuf, Slot>>,
}

impl ScanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch a scan of `root` in the background.
    ///
    /// Rejects an empty path immediately and refuses to start a second scan
    /// of a root that is still running. A finished scan of the same root is
    /// replaced. Must be called from within a Tokio runtime.
    pub fn start(&self, root: impl Into<PathBuf>, config: ScanConfig) -> Result<(), ScanError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(ScanError::EmptyPath);
        }

        let scanner = Arc::new(Scanner::new(config));
        match self.scans.entry(root.clone()) {
            Entry::Occupied(entry) if matches!(entry.get(), Slot::Running(_)) => {
                return Err(ScanError::Other {
                    message: format!("scan already running: {}", root.display()),
                });
            }
            Entry::Occupied(mut entry) => {
                entry.insert(Slot::Running(Arc::clone(&scanner)));
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot::Running(Arc::clone(&scanner)));
            }
        }

        info!(root = %root.display(), "scan registered");

        let scans = Arc::clone(&self.scans);
        tokio::spawn(async move {
            let slot = match scanner.scan(&root).await {
                Ok(result) => Slot::Completed(Arc::new(result)),
                Err(e) => Slot::Failed(e.to_string()),
            };
            scans.insert(root, slot);
        });

        Ok(())
    }

    /// Current status of the scan registered for `root`.
    pub fn status(&self, root: impl AsRef<Path>) -> ScanStatus {
        let Some(slot) = self.scans.get(root.as_ref()) else {
            return ScanStatus::NotFound;
        };

        match slot.value() {
            Slot::Running(scanner) => ScanStatus::Running {
                progress: scanner.progress(),
            },
            Slot::Completed(result) => ScanStatus::Completed {
                result: ScanResult::clone(result),
            },
            Slot::Failed(message) => ScanStatus::Error {
                message: message.clone(),
            },
        }
    }

    /// Cancel a running scan. Returns `false` if no scan is running for `root`.
    pub fn cancel(&self, root: impl AsRef<Path>) -> bool {
        match self.scans.get(root.as_ref()).as_deref() {
            Some(Slot::Running(scanner)) => {
                scanner.cancel();
                true
            }
            _ => false,
        }
    }
}
