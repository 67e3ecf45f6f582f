//! Executor that runs every job on the submitting thread
//!
//! Used for deterministic single-threaded operation: handler calls happen
//! in submission order and `submit` returns only after the job is done.

use super::{Executor, ExecutorStats, Job};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Runs jobs synchronously inside `submit`
#[derive(Debug, Default)]
pub struct InlineExecutor {
    shutdown: AtomicBool,
    stats: Arc<ExecutorStats>,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for InlineExecutor {
    fn submit(&self, job: Job) {
        if self.shutdown.load(Ordering::Acquire) {
            trace!(item = job.label(), "Discarding job submitted after shutdown");
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        let succeeded = job.run();
        self.stats.record_outcome(succeeded);
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    // Nothing is ever queued, so there is nothing to drop.
    fn shutdown_now(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    // Jobs finish inside `submit`.
    fn await_termination(&self) {}

    fn stats(&self) -> Arc<ExecutorStats> {
        Arc::clone(&self.stats)
    }
}
