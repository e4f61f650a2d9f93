//! A single cracking worker and the messages it exchanges with the
//! coordinator and the progress aggregator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::debug;

use crate::partition::WorkRange;
use crate::search::SearchSpace;
use crate::unlock::{ArchiveError, UnlockHandle, UnlockOutcome, Unlocker};

/// Default number of attempts between two progress updates
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Cumulative attempt count of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub worker_id: usize,
    pub attempts: u64,
}

/// A password that unlocked the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundResult {
    pub worker_id: usize,
    pub password: String,
}

/// Run-wide stop signal. Goes from clear to set once and never back.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that actually set it.
    pub fn cancel(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a worker stopped without a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// This worker found the password
    Unlocked,
    /// Every candidate in the range was tried
    Exhausted,
    /// The cancel flag was observed before the range was finished
    Cancelled,
}

/// Sent to the coordinator when a worker stops, whatever the reason
#[derive(Debug)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub attempts: u64,
    pub result: Result<WorkerExit, ArchiveError>,
}

/// Tries every candidate of one [`WorkRange`] in ascending order
pub struct Worker {
    id: usize,
    range: WorkRange,
    space: Arc<SearchSpace>,
    progress: Sender<ProgressUpdate>,
    found: Sender<FoundResult>,
    cancel: Arc<CancelFlag>,
    progress_interval: u64,
    attempts: u64,
}

impl Worker {
    pub fn new(
        id: usize,
        range: WorkRange,
        space: Arc<SearchSpace>,
        progress: Sender<ProgressUpdate>,
        found: Sender<FoundResult>,
        cancel: Arc<CancelFlag>,
        progress_interval: u64,
    ) -> Self {
        Self {
            id,
            range,
            space,
            progress,
            found,
            cancel,
            progress_interval: progress_interval.max(1),
            attempts: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Work through the range until the password is found, the range runs
    /// out, the cancel flag is set, or the archive reports a fatal error.
    pub fn run<U: Unlocker>(&mut self, unlocker: &U) -> Result<WorkerExit, ArchiveError> {
        debug!(
            worker = self.id,
            start = self.range.start,
            end = self.range.end,
            "worker started"
        );

        let mut handle = unlocker.open()?;
        let space = Arc::clone(&self.space);
        let mut candidates = space.candidates(self.range.indices());

        let exit = loop {
            if self.cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }

            let Some(password) = candidates.next() else {
                break WorkerExit::Exhausted;
            };

            let outcome = handle.try_password(&password)?;
            self.attempts += 1;

            if outcome == UnlockOutcome::Unlocked {
                // A full channel means another worker got there first
                let _ = self.found.try_send(FoundResult {
                    worker_id: self.id,
                    password,
                });
                self.cancel.cancel();
                break WorkerExit::Unlocked;
            }

            if self.attempts % self.progress_interval == 0 {
                self.report_progress();
            }
        };

        self.report_progress();
        debug!(worker = self.id, attempts = self.attempts, ?exit, "worker stopped");
        Ok(exit)
    }

    fn report_progress(&self) {
        // The aggregator may already be gone at the end of a run
        let _ = self.progress.send(ProgressUpdate {
            worker_id: self.id,
            attempts: self.attempts,
        });
    }
}
