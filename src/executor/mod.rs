//! Task execution service
//!
//! Handler invocations are wrapped in [`Job`]s and handed to an
//! [`Executor`]. Two implementations share one contract:
//!
//! ```text
//!   driver thread                       Executor
//!  ┌──────────────┐   submit(job)   ┌──────────────────────────┐
//!  │ process_path │ ──────────────▶ │ WorkerPool               │
//!  │ process_     │                 │  bounded crossbeam queue │
//!  │   stream     │                 │  N named worker threads  │
//!  └──────────────┘                 ├──────────────────────────┤
//!                                   │ InlineExecutor           │
//!                                   │  runs job on the caller  │
//!                                   └──────────────────────────┘
//! ```
//!
//! - `submit` never fails. Jobs submitted after shutdown are discarded.
//! - `shutdown` stops intake; accepted jobs still run.
//! - `shutdown_now` stops intake and drops queued jobs. Running jobs are
//!   not interrupted.
//! - `await_termination` blocks until every accepted job has finished.

pub mod inline;
pub mod pool;

pub use inline::InlineExecutor;
pub use pool::WorkerPool;

use crate::config::ExecutionMode;
use crate::error::ExecutorError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Work = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;
type FailureHook = Box<dyn FnOnce(anyhow::Error) + Send + 'static>;

/// A unit of work plus the continuation that receives its failure
///
/// The error produced by the work is passed to the failure hook as-is.
/// A panic inside the work is turned into an error.
pub struct Job {
    label: String,
    work: Work,
    on_failure: FailureHook,
}

impl Job {
    pub fn new<W, F>(label: impl Into<String>, work: W, on_failure: F) -> Self
    where
        W: FnOnce() -> anyhow::Result<()> + Send + 'static,
        F: FnOnce(anyhow::Error) + Send + 'static,
    {
        Self {
            label: label.into(),
            work: Box::new(work),
            on_failure: Box::new(on_failure),
        }
    }

    /// Item path or other description of the job
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the work and route a failure to the hook
    ///
    /// Returns `true` if the work succeeded.
    pub(crate) fn run(self) -> bool {
        let Job {
            label,
            work,
            on_failure,
        } = self;

        let error = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e,
            Err(payload) => anyhow::anyhow!(
                "handler panicked while processing '{}': {}",
                label,
                panic_message(payload.as_ref())
            ),
        };

        on_failure(error);
        false
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Counters shared by every executor implementation
#[derive(Debug, Default)]
pub struct ExecutorStats {
    /// Jobs accepted by `submit`
    pub accepted: AtomicU64,

    /// Jobs that ran to success
    pub succeeded: AtomicU64,

    /// Jobs whose work failed or panicked
    pub failed: AtomicU64,

    /// Jobs dropped because the executor was shut down
    pub discarded: AtomicU64,
}

impl ExecutorStats {
    fn record_outcome(&self, succeeded: bool) {
        if succeeded {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Jobs that finished, successfully or not
    pub fn finished(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed)
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// Runs jobs either on worker threads or on the caller
pub trait Executor: Send + Sync {
    /// Schedule a job. Never fails; late jobs are discarded.
    fn submit(&self, job: Job);

    /// Stop accepting jobs; already accepted jobs still run
    fn shutdown(&self);

    /// Stop accepting jobs and drop the ones still queued
    fn shutdown_now(&self);

    /// Block until all accepted jobs have finished
    ///
    /// Only returns once `shutdown` or `shutdown_now` has been called.
    fn await_termination(&self);

    /// Job counters
    fn stats(&self) -> Arc<ExecutorStats>;
}

/// Create the executor for a mode
pub fn for_mode(mode: ExecutionMode) -> Result<Arc<dyn Executor>, ExecutorError> {
    Ok(match mode {
        ExecutionMode::Inline => Arc::new(InlineExecutor::new()),
        ExecutionMode::Pooled { threads } => Arc::new(WorkerPool::new(threads)?),
    })
}
