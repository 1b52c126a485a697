//! Bulk hashing pipeline.
//!
//! One run is a producer feeding a bounded work queue, a fixed pool of
//! hashing workers, a completion watcher that closes the results queue once
//! every worker is done, and a single drainer that persists results to the
//! local store. Everything is supervised by one task and shares a
//! [`CancellationToken`].
//!
//! ```text
//! plaintexts -> producer -> [work queue] -> N workers -> [results queue] -> drainer -> local store
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::store::Stores;

pub mod persist;
pub(crate) mod worker;

pub use persist::DrainReport;

use worker::{WorkerContext, produce};

/// Depth of the work queue feeding the workers.
pub const WORK_QUEUE_DEPTH: usize = 1024;

/// Notifications emitted while a run is in flight.
///
/// Progress may be reported out of order when several workers finish at
/// once; the counter behind it only ever increases.
pub trait PipelineObserver: Send + Sync {
    fn started(&self, _total: usize) {}

    fn progress(&self, _processed: u64, _total: usize) {}

    fn completed(&self, _summary: &RunSummary) {}

    fn batch_failed(&self, _error: &Error) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: usize,
    pub enqueued: usize,
    pub processed: u64,
    pub drain: DrainReport,
    pub worker_failures: usize,
    pub cancelled: bool,
}

/// Tunables for a run, taken from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub workers: usize,
    pub batch_size: usize,
    pub bulk_size: usize,
    pub results_capacity: usize,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers.max(1),
            batch_size: config.pipeline_batch_size,
            bulk_size: config.bulk_batch_size,
            results_capacity: config.effective_results_capacity(),
        }
    }
}

/// Handle to a running pipeline.
///
/// Dropping it does not stop the run.
pub struct PipelineHandle {
    cancel: CancellationToken,
    processed: Arc<AtomicU64>,
    total: usize,
    task: JoinHandle<RunSummary>,
}

impl PipelineHandle {
    /// Stop feeding new plaintexts; whatever was already hashed is still persisted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run, for wiring up to signals.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Plaintexts fully hashed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Wait for the run to finish draining.
    pub async fn wait(self) -> Result<RunSummary> {
        self.task.await.map_err(|e| Error::Task(e.to_string()))
    }
}

/// Start hashing `plaintexts` in the background.
///
/// Must be called from within a tokio runtime.
pub fn spawn(
    stores: Stores,
    settings: PipelineSettings,
    observer: Arc<dyn PipelineObserver>,
    plaintexts: Vec<String>,
) -> PipelineHandle {
    let cancel = CancellationToken::new();
    let processed = Arc::new(AtomicU64::new(0));
    let total = plaintexts.len();

    let task = tokio::spawn(run(
        stores,
        settings,
        observer,
        plaintexts,
        cancel.clone(),
        Arc::clone(&processed),
    ));

    PipelineHandle { cancel, processed, total, task }
}

async fn run(
    stores: Stores,
    settings: PipelineSettings,
    observer: Arc<dyn PipelineObserver>,
    plaintexts: Vec<String>,
    cancel: CancellationToken,
    processed: Arc<AtomicU64>,
) -> RunSummary {
    let total = plaintexts.len();
    observer.started(total);
    info!(total, workers = settings.workers, "hashing started");

    let (job_tx, job_rx) = crossbeam_channel::bounded::<String>(WORK_QUEUE_DEPTH);
    let capacity = settings.results_capacity.max(4 * settings.workers).max(1);
    let (results_tx, results_rx) = mpsc::channel::<Record>(capacity);

    let producer = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || produce(plaintexts, job_tx, &cancel))
    };

    let mut workers = JoinSet::new();
    for id in 0..settings.workers {
        let ctx = WorkerContext {
            id,
            jobs: job_rx.clone(),
            results: results_tx.clone(),
            progress: Arc::clone(&processed),
            total,
            observer: Arc::clone(&observer),
            cancel: cancel.clone(),
        };
        workers.spawn_blocking(move || worker::worker(ctx));
    }
    drop(job_rx);

    // Holds the last results sender; the queue closes once it is dropped.
    let watcher = tokio::spawn(async move {
        let mut failures = 0;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("hashing worker failed: {}", e);
                failures += 1;
            }
        }
        drop(results_tx);
        failures
    });

    let drain = persist::drain(
        results_rx,
        &stores,
        settings.batch_size,
        settings.bulk_size,
        observer.as_ref(),
    )
    .await;

    let enqueued = producer.await.unwrap_or_else(|e| {
        error!("producer failed: {}", e);
        0
    });
    let worker_failures = watcher.await.unwrap_or_else(|e| {
        error!("completion watcher failed: {}", e);
        settings.workers
    });

    let summary = RunSummary {
        submitted: total,
        enqueued,
        processed: processed.load(Ordering::Relaxed),
        drain,
        worker_failures,
        cancelled: cancel.is_cancelled(),
    };

    observer.completed(&summary);
    info!(
        processed = summary.processed,
        inserted = summary.drain.inserted,
        cancelled = summary.cancelled,
        "Hashing and database insertion completed."
    );
    summary
}
