//! Scan orchestrator.
//!
//! A [`Scanner`] validates the root, wires the traversal, worker pool and
//! collector together over bounded queues, waits for them to drain in order
//! and assembles the [`ScanResult`]. Shutdown is ordered so no result is ever
//! dropped: traversal finishes and closes the work queue, the workers drain
//! it and drop their result senders, and only then does the collector see
//! the result queue close.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::fs;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use filegate_core::{EXPORT_FILE_NAME, ScanConfig, ScanError, ScanProgress, ScanResult};
use filegate_export::{BlockedFilesExporter, JsonExporter};

use crate::classify::Classifier;
use crate::collector::collect;
use crate::progress::ProgressTracker;
use crate::traversal::Traversal;
use crate::worker;

/// Lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanState {
    /// Created, not started.
    Idle,
    /// Checking the root path and config.
    Validating,
    /// Traversal and workers are running.
    Running,
    /// Traversal finished; workers and collector are draining.
    Draining,
    /// Result assembled.
    Completed,
    /// Startup failed; no result.
    Failed,
}

impl ScanState {
    /// Whether the scan has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Everything the pipeline stages share for one scan.
pub(crate) struct ScanContext {
    pub config: ScanConfig,
    pub classifier: Classifier,
    pub progress: Arc<ProgressTracker>,
    pub cancel: CancellationToken,
}

impl ScanContext {
    /// Resolve defaults, validate and compile the rules of `config`.
    pub fn new(config: ScanConfig, cancel: CancellationToken) -> Result<Self, ScanError> {
        let config = config.resolved();
        config.validate()?;
        let classifier = Classifier::new(&config)?;

        Ok(Self {
            config,
            classifier,
            progress: Arc::new(ProgressTracker::new()),
            cancel,
        })
    }
}

/// Concurrent file scanner.
///
/// A scanner runs one scan. Progress can be polled with [`Scanner::progress`]
/// or pushed through [`Scanner::subscribe`] while [`Scanner::scan`] runs.
pub struct Scanner {
    config: ScanConfig,
    exporter: Arc<dyn BlockedFilesExporter>,
    progress: OnceLock<Arc<ProgressTracker>>,
    progress_tx: broadcast::Sender<ScanProgress>,
    state_tx: watch::Sender<ScanState>,
    cancel: CancellationToken,
}

impl Scanner {
    /// Create a scanner for `config`. Blocked files are exported as JSON.
    pub fn new(config: ScanConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        let (state_tx, _) = watch::channel(ScanState::Idle);

        Self {
            config,
            exporter: Arc::new(JsonExporter::new()),
            progress: OnceLock::new(),
            progress_tx,
            state_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the blocked-files exporter.
    pub fn with_exporter(mut self, exporter: impl BlockedFilesExporter + 'static) -> Self {
        self.exporter = Arc::new(exporter);
        self
    }

    /// The configuration this scanner was created with.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Subscribe to progress snapshots pushed during the scan.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Snapshot of the current progress. Safe to call from any task.
    pub fn progress(&self) -> ScanProgress {
        self.progress
            .get()
            .map(|tracker| tracker.snapshot())
            .unwrap_or_default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ScanState> {
        self.state_tx.subscribe()
    }

    /// Request cancellation. Traversal stops descending and workers stop
    /// taking new items; everything already collected is kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this scan when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scan the directory at `root`.
    ///
    /// Returns an error only when the scan cannot start. Per-entry failures
    /// are recorded in the result's progress and clear `success`.
    pub async fn scan(&self, root: impl AsRef<Path>) -> Result<ScanResult, ScanError> {
        let started = self.state_tx.send_if_modified(|state| {
            if *state == ScanState::Idle {
                *state = ScanState::Validating;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(ScanError::invalid_config("scanner already used"));
        }

        match self.run(root.as_ref()).await {
            Ok(result) => {
                self.set_state(ScanState::Completed);
                Ok(result)
            }
            Err(e) => {
                error!(error = %e, "scan failed to start");
                self.set_state(ScanState::Failed);
                Err(e)
            }
        }
    }

    async fn run(&self, root: &Path) -> Result<ScanResult, ScanError> {
        let (root, root_modified) = validate_root(root).await?;
        let ctx = ScanContext::new(self.config.clone(), self.cancel.clone())?;
        let _ = self.progress.set(Arc::clone(&ctx.progress));
        let ctx = Arc::new(ctx);

        info!(
            root = %root.display(),
            workers = ctx.config.worker_count,
            recursive = ctx.config.recursive,
            "starting scan"
        );

        let (work_tx, work_rx) = mpsc::channel(ctx.config.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(ctx.config.result_queue_capacity);

        self.set_state(ScanState::Running);

        let collector = tokio::spawn(collect(
            result_rx,
            Arc::clone(&ctx.progress),
            self.progress_tx.clone(),
        ));
        let mut pool = worker::spawn_pool(&ctx, work_rx, result_tx.clone());
        let traversal = Traversal::start(
            Arc::clone(&ctx),
            root.clone(),
            root_modified,
            work_tx,
            result_tx,
        );

        traversal.wait().await;
        self.set_state(ScanState::Draining);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                ctx.progress.record_error(format!("worker task failed: {e}"));
            }
        }

        let files = collector.await.map_err(|e| ScanError::Other {
            message: format!("result collector failed: {e}"),
        })?;

        let progress = ctx.progress.snapshot();
        let mut result = ScanResult {
            root,
            files,
            success: progress.errors.is_empty(),
            progress,
            duration: ctx.progress.elapsed(),
            error: None,
        };

        if self.cancel.is_cancelled() {
            warn!("scan cancelled before completion");
            result.error = Some(ScanError::Cancelled.to_string());
            result.success = false;
        }

        if ctx.config.export_on_completion {
            result = self.export(result).await;
        }

        let _ = self.progress_tx.send(result.progress.clone());

        info!(
            files = result.files.len(),
            blocked = result.progress.blocked_files,
            errors = result.progress.errors.len(),
            elapsed_ms = result.duration.as_millis() as u64,
            "scan finished"
        );

        Ok(result)
    }

    /// Write the blocked-files manifest on the blocking pool. A failed or
    /// panicking exporter is recorded in the result, never propagated.
    async fn export(&self, result: ScanResult) -> ScanResult {
        let output = result.root.join(EXPORT_FILE_NAME);
        let shared = Arc::new(result);
        let exporter = Arc::clone(&self.exporter);
        let snapshot = Arc::clone(&shared);

        let outcome =
            tokio::task::spawn_blocking(move || exporter.export(&snapshot, &output)).await;

        let mut result =
            Arc::try_unwrap(shared).unwrap_or_else(|shared| ScanResult::clone(&shared));
        let failure = match outcome {
            Ok(Ok(())) => return result,
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("export task failed: {e}"),
        };

        warn!(error = %failure, "blocked files export failed");
        result.push_error(format!("Failed to export blocked files: {failure}"));
        result
    }

    fn set_state(&self, state: ScanState) {
        self.state_tx.send_replace(state);
    }
}

/// Canonicalize the root and make sure it is a directory.
async fn validate_root(root: &Path) -> Result<(PathBuf, Option<DateTime<Utc>>), ScanError> {
    if root.as_os_str().is_empty() {
        return Err(ScanError::EmptyPath);
    }

    let root = fs::canonicalize(root)
        .await
        .map_err(|e| ScanError::io(root, e))?;
    let metadata = fs::metadata(&root)
        .await
        .map_err(|e| ScanError::io(&root, e))?;

    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory { path: root });
    }

    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
    Ok((root, modified))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ScanState::Draining.to_string(), "draining");
        assert!(ScanState::Completed.is_terminal());
        assert!(!ScanState::Running.is_terminal());
    }

    #[tokio::test]
    async fn test_empty_path_fails_startup() {
        let scanner = Scanner::new(ScanConfig::default());
        let err = scanner.scan("").await.unwrap_err();

        assert!(matches!(err, ScanError::EmptyPath));
        assert_eq!(scanner.state(), ScanState::Failed);
    }

    #[tokio::test]
    async fn test_oversized_queue_capacity_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig {
            queue_capacity: usize::MAX,
            ..Default::default()
        };
        let scanner = Scanner::new(config);

        let err = scanner.scan(dir.path()).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig { .. }));
        assert_eq!(scanner.state(), ScanState::Failed);
    }

    #[tokio::test]
    async fn test_oversized_traversal_cap_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig {
            max_traversal_tasks: Some(usize::MAX),
            ..Default::default()
        };

        let err = Scanner::new(config).scan(dir.path()).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig { .. }));
    }

    #[test]
    fn test_capacity_limit_matches_semaphore() {
        assert_eq!(filegate_core::MAX_CAPACITY, tokio::sync::Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn test_progress_before_scan_is_empty() {
        let scanner = Scanner::new(ScanConfig::default());
        let progress = scanner.progress();

        assert_eq!(progress.total_files, 0);
        assert!(progress.errors.is_empty());
        assert_eq!(scanner.state(), ScanState::Idle);
    }
}
