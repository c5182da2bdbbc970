//! Fixed-size worker pool.
//!
//! Workers share one receiver for the work queue. Each worker stats the
//! file, sniffs its leading bytes and classifies it, then sends the record
//! to the collector. A worker that has already dequeued an item finishes it
//! even if the scan is cancelled meanwhile.

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use filegate_core::{FileRecord, ScanError, WorkItem};

use crate::collector::ScanOutcome;
use crate::scanner::ScanContext;
use crate::sniff::{SNIFF_LEN, detect_content_type, file_type_label};

type SharedQueue = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// Spawn `ctx.config.worker_count` workers draining `work_rx`.
pub(crate) fn spawn_pool(
    ctx: &Arc<ScanContext>,
    work_rx: mpsc::Receiver<WorkItem>,
    result_tx: mpsc::Sender<ScanOutcome>,
) -> JoinSet<()> {
    let queue: SharedQueue = Arc::new(Mutex::new(work_rx));
    let mut pool = JoinSet::new();

    for id in 0..ctx.config.worker_count {
        pool.spawn(run_worker(
            id,
            Arc::clone(ctx),
            Arc::clone(&queue),
            result_tx.clone(),
        ));
    }

    pool
}

async fn run_worker(
    id: usize,
    ctx: Arc<ScanContext>,
    queue: SharedQueue,
    result_tx: mpsc::Sender<ScanOutcome>,
) {
    let mut processed = 0usize;

    loop {
        let item = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            item = next_item(&queue) => match item {
                Some(item) => item,
                None => break,
            },
        };

        let outcome = process(&ctx, item).await;
        processed += 1;
        if result_tx.send(outcome).await.is_err() {
            break;
        }
    }

    debug!(worker = id, processed, "worker finished");
}

async fn next_item(queue: &SharedQueue) -> Option<WorkItem> {
    queue.lock().await.recv().await
}

/// Stat, sniff and classify one queued file.
pub(crate) async fn process(ctx: &ScanContext, item: WorkItem) -> ScanOutcome {
    trace!(path = %item.path.display(), "processing");

    let metadata = match fs::metadata(&item.path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            let error = ScanError::io(&item.path, e);
            let mut record = FileRecord::new_file(item.path);
            record.mark_inaccessible(&error);
            ctx.progress.record_processed(0);
            ctx.progress.record_blocked();
            return ScanOutcome::Failed { record, error };
        }
    };
    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    // Symlinks are never followed for traversal; one pointing at a
    // directory is recorded as a directory and left alone. Directories
    // never count as processed files.
    if metadata.is_dir() {
        return ScanOutcome::Record(FileRecord::new_directory(item.path, modified));
    }

    let mut record = FileRecord::new_file(item.path);
    record.size = metadata.len();
    record.modified = modified;

    let error = match read_prefix(&record.path).await {
        Ok(prefix) => {
            record.mime_type = detect_content_type(&prefix).to_string();
            None
        }
        Err(e) => Some(ScanError::io(&record.path, e)),
    };
    record.file_type = file_type_label(&record.extension, &record.mime_type);

    ctx.classifier.apply(&mut record);
    if let Some(error) = &error {
        record.mark_inaccessible(error);
    }

    ctx.progress.record_processed(record.size);
    if record.is_blocked {
        ctx.progress.record_blocked();
    }

    match error {
        Some(error) => ScanOutcome::Failed { record, error },
        None => ScanOutcome::Record(record),
    }
}

/// Read up to [`SNIFF_LEN`] bytes. An empty file yields an empty prefix.
async fn read_prefix(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path).await?;
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut prefix).await?;
    Ok(prefix)
}
