//! Result collector.
//!
//! A single task owns the record list. It drains the result queue until
//! every producer has dropped its sender, logs errors into the progress
//! tracker and pushes a progress snapshot to subscribers at a fixed
//! interval of arrivals.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use filegate_core::{FileRecord, ScanError, ScanProgress};

use crate::progress::ProgressTracker;

/// Records collected between pushed progress snapshots.
pub const PROGRESS_INTERVAL: usize = 100;

/// What a traversal task or worker hands to the collector.
#[derive(Debug)]
pub(crate) enum ScanOutcome {
    /// A classified entry.
    Record(FileRecord),
    /// An entry that could not be fully read. The record is kept and the
    /// error is logged.
    Failed { record: FileRecord, error: ScanError },
    /// An error with no entry attached, e.g. a failed directory read.
    Error(ScanError),
}

/// Drain `results` until it closes and return the records in arrival order.
pub(crate) async fn collect(
    mut results: mpsc::Receiver<ScanOutcome>,
    progress: Arc<ProgressTracker>,
    updates: broadcast::Sender<ScanProgress>,
) -> Vec<FileRecord> {
    let mut files = Vec::new();

    while let Some(outcome) = results.recv().await {
        let record = match outcome {
            ScanOutcome::Record(record) => record,
            ScanOutcome::Failed { record, error } => {
                log_error(&progress, &error);
                record
            }
            ScanOutcome::Error(error) => {
                log_error(&progress, &error);
                continue;
            }
        };

        if let Some(dir) = record.parent_dir() {
            progress.record_arrival(dir);
        }
        files.push(record);

        if files.len() % PROGRESS_INTERVAL == 0 {
            // No subscribers is fine.
            let _ = updates.send(progress.snapshot());
        }
    }

    files
}

fn log_error(progress: &ProgressTracker, error: &ScanError) {
    warn!(path = ?error.path(), %error, "scan error");
    progress.record_error(error.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_collects_records_and_errors() {
        let (tx, rx) = mpsc::channel(8);
        let (updates, _) = broadcast::channel(4);
        let progress = Arc::new(ProgressTracker::new());

        let collector = tokio::spawn(collect(rx, Arc::clone(&progress), updates));

        tx.send(ScanOutcome::Record(FileRecord::new_file("/scan/a.txt")))
            .await
            .unwrap();
        let mut locked = FileRecord::new_directory("/scan/locked", None);
        locked.mark_inaccessible("Permission denied");
        tx.send(ScanOutcome::Failed {
            record: locked,
            error: ScanError::PermissionDenied {
                path: PathBuf::from("/scan/locked"),
            },
        })
        .await
        .unwrap();
        tx.send(ScanOutcome::Error(ScanError::Other {
            message: "listing interrupted".into(),
        }))
        .await
        .unwrap();
        drop(tx);

        let files = collector.await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name.as_str(), "a.txt");
        assert!(files[1].is_blocked);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.errors.len(), 2);
        assert_eq!(snapshot.current_directory, PathBuf::from("/scan"));
    }

    #[tokio::test]
    async fn test_pushes_progress_at_interval() {
        let (tx, rx) = mpsc::channel(16);
        let (updates, mut update_rx) = broadcast::channel(4);
        let progress = Arc::new(ProgressTracker::new());

        let collector = tokio::spawn(collect(rx, progress, updates));
        for i in 0..PROGRESS_INTERVAL * 2 + 1 {
            tx.send(ScanOutcome::Record(FileRecord::new_file(format!("/scan/{i}"))))
                .await
                .unwrap();
        }
        drop(tx);

        let files = collector.await.unwrap();
        assert_eq!(files.len(), PROGRESS_INTERVAL * 2 + 1);

        let mut pushed = 0;
        while update_rx.try_recv().is_ok() {
            pushed += 1;
        }
        assert_eq!(pushed, 2);
    }
}
