use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use raingo_core::{Error, PipelineObserver, RunSummary};

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Drives an indicatif bar from pipeline notifications.
pub struct ProgressObserver {
    bar: Option<ProgressBar>,
    high_water: AtomicU64,
    failed_batches: AtomicU64,
}

impl ProgressObserver {
    pub fn new(enabled: bool) -> Self {
        let bar = enabled.then(|| {
            let pb = ProgressBar::hidden();
            let style = ProgressStyle::default_bar()
                .template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            pb
        });
        Self { bar, high_water: AtomicU64::new(0), failed_batches: AtomicU64::new(0) }
    }
}

impl PipelineObserver for ProgressObserver {
    fn started(&self, total: usize) {
        if let Some(pb) = &self.bar {
            pb.set_length(total as u64);
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
    }

    fn progress(&self, processed: u64, _total: usize) {
        // workers report concurrently; never move the bar backwards
        let previous = self.high_water.fetch_max(processed, Ordering::Relaxed);
        if processed > previous {
            if let Some(pb) = &self.bar {
                pb.set_position(processed);
            }
        }
    }

    fn completed(&self, summary: &RunSummary) {
        if let Some(pb) = &self.bar {
            let msg = if summary.cancelled { "cancelled" } else { "done" };
            pb.finish_with_message(msg);
        }
    }

    fn batch_failed(&self, error: &Error) {
        let failed = self.failed_batches.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{failed} failed batches ({error})"));
        }
    }
}
