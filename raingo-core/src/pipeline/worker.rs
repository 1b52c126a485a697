use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::PipelineObserver;
use crate::record::{Record, digest_all};

/// Feed every plaintext onto the work queue, then close it by dropping the sender.
///
/// Stops early on cancellation or once every worker has gone away. Returns
/// the number of plaintexts enqueued.
pub(crate) fn produce(
    plaintexts: Vec<String>,
    jobs: Sender<String>,
    cancel: &CancellationToken,
) -> usize {
    let mut enqueued = 0;
    for plaintext in plaintexts {
        if cancel.is_cancelled() {
            debug!(enqueued, "producer cancelled");
            break;
        }
        if jobs.send(plaintext).is_err() {
            debug!(enqueued, "work queue closed before input was exhausted");
            break;
        }
        enqueued += 1;
    }
    enqueued
}

/// Everything one hashing worker shares with the rest of the run.
pub(crate) struct WorkerContext {
    pub id: usize,
    pub jobs: Receiver<String>,
    pub results: mpsc::Sender<Record>,
    pub progress: Arc<AtomicU64>,
    pub total: usize,
    pub observer: Arc<dyn PipelineObserver>,
    pub cancel: CancellationToken,
}

/// Worker that hashes plaintexts off the work queue until it is closed and empty.
///
/// Runs on a blocking thread: the send into the results queue blocks while
/// the queue is full. Returns the number of plaintexts processed.
pub(crate) fn worker(ctx: WorkerContext) -> u64 {
    let mut processed = 0u64;
    for plaintext in ctx.jobs.iter() {
        if ctx.cancel.is_cancelled() {
            break;
        }

        for record in digest_all(&plaintext) {
            if ctx.results.blocking_send(record).is_err() {
                debug!(worker = ctx.id, "results queue closed, stopping");
                return processed;
            }
        }

        processed += 1;
        let done = ctx.progress.fetch_add(1, Ordering::Relaxed) + 1;
        ctx.observer.progress(done, ctx.total);
    }

    debug!(worker = ctx.id, processed, "worker finished");
    processed
}
