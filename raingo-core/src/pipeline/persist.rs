use tokio::sync::mpsc;
use tracing::{error, info};

use super::PipelineObserver;
use crate::record::Record;
use crate::store::Stores;

/// What the drainer did with the records it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub received: usize,
    pub inserted: usize,
    pub flushed_batches: usize,
    pub failed_batches: usize,
    /// Records not stored because a bulk write failed; chunks of the same
    /// batch committed before the failure are counted as inserted.
    pub dropped: usize,
}

/// Drain the results queue into the local store until it closes.
///
/// Records are buffered into batches of `batch_size` and written with a
/// deduplicated insert in bulk writes of `bulk_size`; the partial last batch
/// is flushed once the queue is exhausted. A failed flush is logged, reported
/// to `observer` and skipped.
pub(crate) async fn drain(
    mut results: mpsc::Receiver<Record>,
    stores: &Stores,
    batch_size: usize,
    bulk_size: usize,
    observer: &dyn PipelineObserver,
) -> DrainReport {
    let mut report = DrainReport::default();
    let mut batch: Vec<Record> = Vec::with_capacity(batch_size.min(16_384));

    while let Some(record) = results.recv().await {
        report.received += 1;
        batch.push(record);
        if batch.len() >= batch_size {
            flush(&mut batch, stores, bulk_size, observer, &mut report, "batch").await;
        }
    }

    if !batch.is_empty() {
        flush(&mut batch, stores, bulk_size, observer, &mut report, "final batch").await;
    }

    info!(
        received = report.received,
        inserted = report.inserted,
        failed_batches = report.failed_batches,
        "results drained"
    );
    report
}

async fn flush(
    batch: &mut Vec<Record>,
    stores: &Stores,
    bulk_size: usize,
    observer: &dyn PipelineObserver,
    report: &mut DrainReport,
    label: &str,
) {
    let (written, failure) = stores.insert_deduped_partial(batch, bulk_size).await;
    report.inserted += written.inserted;
    match failure {
        None => report.flushed_batches += 1,
        Some(e) => {
            let lost = batch.len() - written.attempted;
            error!("Error during {} insertion of {} records: {}", label, lost, e);
            observer.batch_failed(&e);
            report.failed_batches += 1;
            report.dropped += lost;
        }
    }
    batch.clear();
}
