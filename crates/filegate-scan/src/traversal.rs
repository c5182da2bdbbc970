//! Directory traversal coordinator.
//!
//! Each directory is listed by its own task. In recursive mode a task spawns
//! one child task per subdirectory, so fan-out is unbounded unless
//! `max_traversal_tasks` caps how many tasks may list at once. Files are
//! pushed onto the bounded work queue; a full queue suspends the listing
//! task, which keeps discovery from outrunning the worker pool.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::task::TaskTracker;
use tracing::debug;

use filegate_core::{EXPORT_FILE_NAME, FileRecord, ScanError, WorkItem};

use crate::collector::ScanOutcome;
use crate::scanner::ScanContext;

/// Spawns and tracks traversal tasks for one scan.
#[derive(Clone)]
pub(crate) struct Traversal {
    ctx: Arc<ScanContext>,
    work_tx: mpsc::Sender<WorkItem>,
    result_tx: mpsc::Sender<ScanOutcome>,
    tasks: TaskTracker,
    limiter: Option<Arc<Semaphore>>,
}

impl Traversal {
    /// Start traversing `root`. The returned tracker completes once every
    /// traversal task has finished; by then all work senders are dropped and
    /// the work queue is closed.
    pub fn start(
        ctx: Arc<ScanContext>,
        root: PathBuf,
        root_modified: Option<DateTime<Utc>>,
        work_tx: mpsc::Sender<WorkItem>,
        result_tx: mpsc::Sender<ScanOutcome>,
    ) -> TaskTracker {
        let tasks = TaskTracker::new();
        let limiter = ctx
            .config
            .max_traversal_tasks
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let traversal = Self {
            ctx,
            work_tx,
            result_tx,
            tasks: tasks.clone(),
            limiter,
        };
        traversal.spawn_directory(root, root_modified);

        // Closing only stops `wait` from returning while tasks remain;
        // running tasks can still spawn children.
        tasks.close();
        tasks
    }

    fn spawn_directory(&self, path: PathBuf, modified: Option<DateTime<Utc>>) {
        let traversal = self.clone();
        self.tasks
            .spawn(async move { traversal.scan_directory(path, modified).await });
    }

    async fn scan_directory(self, path: PathBuf, modified: Option<DateTime<Utc>>) {
        let _permit = match &self.limiter {
            Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return,
            },
            None => None,
        };

        debug!(path = %path.display(), "listing directory");
        let mut record = FileRecord::new_directory(&path, modified);

        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) => {
                let error = ScanError::io(&path, e);
                record.mark_inaccessible(&error);
                self.emit(record, Some(error)).await;
                return;
            }
        };
        if !self.emit(record, None).await {
            return;
        }

        loop {
            if self.ctx.cancel.is_cancelled() {
                debug!(path = %path.display(), "traversal cancelled");
                break;
            }

            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    self.report(ScanError::io(&path, e)).await;
                    break;
                }
            };

            if !self.visit(entry).await {
                break;
            }
        }
    }

    /// Handle one directory entry. Returns `false` once the scan is shutting down.
    async fn visit(&self, entry: fs::DirEntry) -> bool {
        let path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(e) => return self.report(ScanError::io(&path, e)).await,
        };

        if file_type.is_dir() {
            let modified = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);

            if self.ctx.config.recursive {
                self.spawn_directory(path, modified);
                return true;
            }
            // Only the root is listed in non-recursive mode, so this is a
            // direct child: record it without descending.
            return self.emit(FileRecord::new_directory(path, modified), None).await;
        }

        if self.ctx.config.export_on_completion && entry.file_name() == EXPORT_FILE_NAME {
            return true;
        }

        let size = if file_type.is_file() {
            entry.metadata().await.map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };
        self.ctx.progress.record_discovered(size);

        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => false,
            sent = self.work_tx.send(WorkItem::file(path)) => sent.is_ok(),
        }
    }

    /// Count a directory record and hand it to the collector.
    async fn emit(&self, record: FileRecord, error: Option<ScanError>) -> bool {
        self.ctx.progress.record_discovered(record.size);
        if record.is_blocked {
            self.ctx.progress.record_blocked();
        }

        let outcome = match error {
            Some(error) => ScanOutcome::Failed { record, error },
            None => ScanOutcome::Record(record),
        };
        self.result_tx.send(outcome).await.is_ok()
    }

    async fn report(&self, error: ScanError) -> bool {
        self.result_tx.send(ScanOutcome::Error(error)).await.is_ok()
    }
}
