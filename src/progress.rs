//! Combined progress display for all workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use indicatif::{ProgressBar, ProgressStyle};

use crate::worker::{CancelFlag, ProgressUpdate};

/// How often the combined count is rendered
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on a single wait so cancellation is noticed promptly
const MAX_WAIT: Duration = Duration::from_millis(100);

/// Latest attempt count per worker
#[derive(Debug, Default, Clone)]
pub struct ProgressTally {
    counts: HashMap<usize, u64>,
}

impl ProgressTally {
    pub fn record(&mut self, update: ProgressUpdate) {
        self.counts.insert(update.worker_id, update.attempts);
    }

    /// Sum over the workers that have reported so far
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn workers(&self) -> usize {
        self.counts.len()
    }
}

/// Build the progress bar used while cracking
pub fn progress_bar(len: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("Invalid template")
            .progress_chars("█▓▒░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Drains [`ProgressUpdate`]s and periodically renders `attempted / total`
pub struct ProgressAggregator {
    bar: ProgressBar,
    report_interval: Duration,
}

impl ProgressAggregator {
    pub fn new(bar: ProgressBar, report_interval: Duration) -> Self {
        Self {
            bar,
            report_interval,
        }
    }

    /// Run until the cancel flag is set or every worker has hung up.
    ///
    /// Returns the final per-worker tally.
    pub fn run(self, updates: Receiver<ProgressUpdate>, cancel: Arc<CancelFlag>) -> ProgressTally {
        let mut tally = ProgressTally::default();
        let mut next_render = Instant::now() + self.report_interval;

        while !cancel.is_cancelled() {
            let wait = next_render
                .saturating_duration_since(Instant::now())
                .min(MAX_WAIT);

            match updates.recv_timeout(wait) {
                Ok(update) => tally.record(update),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if Instant::now() >= next_render {
                self.bar.set_position(tally.total());
                next_render = Instant::now() + self.report_interval;
            }
        }

        // Workers send a last update as they stop
        for update in updates.try_iter() {
            tally.record(update);
        }

        self.bar.set_position(tally.total());
        self.bar.finish_and_clear();
        tally
    }
}
