//! Runs one brute-force search: partitions the window, starts the workers
//! and the progress aggregator, and decides how the run ends.

use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, unbounded, RecvTimeoutError, Sender};
use indicatif::ProgressBar;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::partition::{partition_range, PartitionError};
use crate::progress::{ProgressAggregator, DEFAULT_REPORT_INTERVAL};
use crate::search::SearchSpace;
use crate::unlock::{ArchiveError, Unlocker};
use crate::worker::{
    CancelFlag, FoundResult, ProgressUpdate, Worker, WorkerReport, DEFAULT_PROGRESS_INTERVAL,
};

/// How long the coordinator blocks on its channels before re-checking
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long stopped-but-busy workers get before they are abandoned
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Tuning for a run. None of these affect correctness.
#[derive(Debug, Clone)]
pub struct CrackConfig {
    pub workers: usize,
    pub progress_interval: u64,
    pub report_interval: Duration,
    pub poll_interval: Duration,
    pub grace_period: Duration,
}

impl Default for CrackConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Running,
    Succeeded,
    Exhausted,
    Failed,
}

/// Non-fatal ways a run can end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrackOutcome {
    Found(String),
    /// Every candidate in the window was tried
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct CrackReport {
    pub outcome: CrackOutcome,
    pub attempts: u64,
    pub workers: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum CrackError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("worker {worker} stopped on a fatal archive error: {source}")]
    Worker {
        worker: usize,
        #[source]
        source: ArchiveError,
    },

    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    #[error("a worker stopped without reporting back")]
    WorkerLost,

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to start progress thread: {0}")]
    Spawn(#[source] io::Error),
}

/// What the worker-exit channel carries
enum WorkerEvent {
    Finished(WorkerReport),
    Panicked(usize),
}

/// Reports a worker that unwinds instead of returning
struct PanicGuard {
    worker_id: usize,
    done: Sender<WorkerEvent>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.done.send(WorkerEvent::Panicked(self.worker_id));
        }
    }
}

/// Owns everything one run needs; nothing outlives [`Coordinator::run`]
pub struct Coordinator<U: Unlocker> {
    unlocker: Arc<U>,
    space: Arc<SearchSpace>,
    config: CrackConfig,
}

impl<U: Unlocker> Coordinator<U> {
    pub fn new(unlocker: U, space: SearchSpace, config: CrackConfig) -> Self {
        Self {
            unlocker: Arc::new(unlocker),
            space: Arc::new(space),
            config,
        }
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Search `window` (a sub-range of the candidate indices) for the password
    pub fn run(&self, window: Range<u64>, bar: ProgressBar) -> Result<CrackReport, CrackError> {
        let started = Instant::now();
        let mut state = RunState::Init;
        debug!(?state, start = window.start, end = window.end, "run starting");

        // Fail fast on a missing or broken archive before any thread exists
        drop(self.unlocker.open()?);

        let ranges = partition_range(window.clone(), self.config.workers)?;
        let worker_count = ranges.len();
        debug!(workers = worker_count, ?ranges, "partitioned search window");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("cracker-{}", i))
            .panic_handler(|_| error!("cracking worker panicked"))
            .build()?;

        let cancel = Arc::new(CancelFlag::new());
        let (progress_tx, progress_rx) = unbounded::<ProgressUpdate>();
        let (found_tx, found_rx) = bounded::<FoundResult>(1);
        let (done_tx, done_rx) = unbounded::<WorkerEvent>();

        bar.set_length(window.end.saturating_sub(window.start));
        let aggregator = ProgressAggregator::new(bar, self.config.report_interval);
        let progress_thread = {
            let cancel = Arc::clone(&cancel);
            thread::Builder::new()
                .name("progress".to_string())
                .spawn(move || aggregator.run(progress_rx, cancel))
                .map_err(CrackError::Spawn)?
        };

        for (id, range) in ranges.into_iter().enumerate() {
            let mut worker = Worker::new(
                id,
                range,
                Arc::clone(&self.space),
                progress_tx.clone(),
                found_tx.clone(),
                Arc::clone(&cancel),
                self.config.progress_interval,
            );
            let unlocker = Arc::clone(&self.unlocker);
            let guard = PanicGuard {
                worker_id: id,
                done: done_tx.clone(),
            };
            pool.spawn(move || {
                let guard = guard;
                let result = worker.run(unlocker.as_ref());
                let _ = guard.done.send(WorkerEvent::Finished(WorkerReport {
                    worker_id: worker.id(),
                    attempts: worker.attempts(),
                    result,
                }));
            });
        }

        // Only workers hold senders from here on, so a disconnect means
        // every worker is gone
        drop(progress_tx);
        drop(found_tx);
        drop(done_tx);

        state = transition(state, RunState::Running);

        let mut running = worker_count;
        let mut finished: Vec<ProgressUpdate> = Vec::with_capacity(worker_count);
        let mut found: Option<FoundResult> = None;
        let mut failure: Option<CrackError> = None;

        while running > 0 && found.is_none() && failure.is_none() {
            select! {
                recv(found_rx) -> msg => {
                    if let Ok(result) = msg {
                        found = Some(result);
                    }
                }
                recv(done_rx) -> msg => match msg {
                    Ok(WorkerEvent::Finished(WorkerReport { worker_id, attempts, result })) => {
                        running -= 1;
                        finished.push(ProgressUpdate { worker_id, attempts });
                        match result {
                            Ok(exit) => debug!(worker = worker_id, ?exit, "worker finished"),
                            Err(source) => {
                                failure = Some(CrackError::Worker {
                                    worker: worker_id,
                                    source,
                                });
                            }
                        }
                    }
                    Ok(WorkerEvent::Panicked(worker)) => {
                        running -= 1;
                        failure = Some(CrackError::WorkerPanicked { worker });
                    }
                    Err(_) => failure = Some(CrackError::WorkerLost),
                },
                default(self.config.poll_interval) => {}
            }
        }

        // The winning worker sends its result before its exit report
        if found.is_none() && failure.is_none() {
            found = found_rx.try_recv().ok();
        }

        // Re-assert: covers exhaustion and failure, and races with the finder
        cancel.cancel();

        let deadline = Instant::now() + self.config.grace_period;
        while running > 0 {
            match done_rx.recv_deadline(deadline) {
                Ok(WorkerEvent::Finished(report)) => {
                    running -= 1;
                    if let Err(err) = &report.result {
                        debug!(worker = report.worker_id, %err, "error after the run was decided");
                    }
                    finished.push(ProgressUpdate {
                        worker_id: report.worker_id,
                        attempts: report.attempts,
                    });
                }
                Ok(WorkerEvent::Panicked(worker)) => {
                    running -= 1;
                    debug!(worker, "worker panicked after the run was decided");
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        workers = running,
                        grace_ms = self.config.grace_period.as_millis() as u64,
                        "abandoning workers that did not stop in time"
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // Idle threads exit now; abandoned ones exit after their current attempt
        drop(pool);

        let mut tally = progress_thread.join().unwrap_or_else(|_| {
            warn!("progress thread panicked");
            Default::default()
        });
        // Exit reports carry each worker's final count
        for update in finished {
            tally.record(update);
        }

        let outcome = match (found, failure) {
            (Some(result), _) => {
                transition(state, RunState::Succeeded);
                debug!(worker = result.worker_id, "password found");
                CrackOutcome::Found(result.password)
            }
            (None, Some(err)) => {
                transition(state, RunState::Failed);
                return Err(err);
            }
            (None, None) => {
                transition(state, RunState::Exhausted);
                CrackOutcome::Exhausted
            }
        };

        Ok(CrackReport {
            outcome,
            attempts: tally.total(),
            workers: worker_count,
            elapsed: started.elapsed(),
        })
    }
}

fn transition(from: RunState, to: RunState) -> RunState {
    debug!(?from, ?to, "run state changed");
    to
}
