//! Fixed-size worker pool
//!
//! Each worker:
//! - Pulls jobs from a shared bounded queue
//! - Runs the job, routing failures to the job's hook
//! - Exits when the queue is closed and drained, or at once when the pool
//!   is cancelled
//!
//! Queued jobs may hold a whole document in memory, so the queue holds at
//! most half as many jobs as there are workers. A full queue makes `submit`
//! wait, which throttles the driver thread.

use super::{Executor, ExecutorStats, Job};
use crate::error::ExecutorError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// How long blocked sends and idle receives wait before re-checking flags
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A worker thread that runs jobs
struct PoolWorker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl PoolWorker {
    fn spawn(
        id: usize,
        receiver: Receiver<Job>,
        cancelled: Arc<AtomicBool>,
        active: Arc<AtomicUsize>,
        stats: Arc<ExecutorStats>,
    ) -> Result<Self, ExecutorError> {
        let handle = thread::Builder::new()
            .name(format!("walker-{}", id))
            .spawn(move || worker_loop(id, receiver, cancelled, active, stats))
            .map_err(|e| ExecutorError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    fn is_current_thread(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| h.thread().id() == thread::current().id())
            .unwrap_or(false)
    }

    /// Wait for the worker to finish
    fn join(mut self) -> Result<(), ExecutorError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ExecutorError::Panicked {
                id: self.id,
                message: "Worker thread panicked".into(),
            }),
            None => Ok(()),
        }
    }
}

/// RAII guard counting a worker as busy
struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveGuard<'a> {
    fn new(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self { active }
    }
}

impl<'a> Drop for ActiveGuard<'a> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    receiver: Receiver<Job>,
    cancelled: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    stats: Arc<ExecutorStats>,
) {
    debug!(worker = id, "Worker starting");
    let mut jobs_run = 0u64;

    while !cancelled.load(Ordering::Acquire) {
        let job = match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if cancelled.load(Ordering::Acquire) {
            trace!(worker = id, item = job.label(), "Dropping job after cancellation");
            stats.discarded.fetch_add(1, Ordering::Relaxed);
            break;
        }

        let _guard = ActiveGuard::new(&active);
        let succeeded = job.run();
        stats.record_outcome(succeeded);
        jobs_run += 1;
    }

    // A submit racing `shutdown_now` can land a job after its drain.
    if cancelled.load(Ordering::Acquire) {
        let dropped = receiver.try_iter().count() as u64;
        stats.discarded.fetch_add(dropped, Ordering::Relaxed);
    }

    debug!(worker = id, jobs = jobs_run, "Worker shutting down");
}

/// Executor backed by a fixed number of worker threads
pub struct WorkerPool {
    /// Intake side of the job queue; `None` once shut down
    sender: Mutex<Option<Sender<Job>>>,

    /// Kept for draining queued jobs on `shutdown_now`
    receiver: Receiver<Job>,

    /// Worker threads, joined by `await_termination`
    workers: Mutex<Vec<PoolWorker>>,

    /// No new jobs are accepted
    shutdown: AtomicBool,

    /// Queued jobs are dropped and workers stop picking up work
    cancelled: Arc<AtomicBool>,

    /// Number of workers currently running a job
    active: Arc<AtomicUsize>,

    stats: Arc<ExecutorStats>,
}

impl WorkerPool {
    /// Start `threads` workers (at least one)
    pub fn new(threads: usize) -> Result<Self, ExecutorError> {
        let size = threads.max(1);
        let capacity = (size / 2).max(1);
        let (sender, receiver) = bounded(capacity);

        let cancelled = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(ExecutorStats::default());

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            // On failure the sender is dropped on return, so already spawned
            // workers see a closed queue and exit.
            let worker = PoolWorker::spawn(
                id,
                receiver.clone(),
                Arc::clone(&cancelled),
                Arc::clone(&active),
                Arc::clone(&stats),
            )?;
            workers.push(worker);
        }

        info!(workers = size, queue = capacity, "Worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            workers: Mutex::new(workers),
            shutdown: AtomicBool::new(false),
            cancelled,
            active,
            stats,
        })
    }

    /// Workers currently running a job
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn discard(&self, job: Job) {
        trace!(item = job.label(), "Discarding job submitted after shutdown");
        self.stats.discarded.fetch_add(1, Ordering::Relaxed);
    }
}

impl Executor for WorkerPool {
    fn submit(&self, job: Job) {
        let sender = match self.sender.lock().as_ref() {
            Some(sender) if !self.shutdown.load(Ordering::Acquire) => sender.clone(),
            _ => return self.discard(job),
        };

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        let mut job = job;
        loop {
            match sender.send_timeout(job, POLL_INTERVAL) {
                Ok(()) => return,
                Err(SendTimeoutError::Timeout(pending)) => {
                    if self.cancelled.load(Ordering::Acquire) {
                        self.stats.accepted.fetch_sub(1, Ordering::Relaxed);
                        return self.discard(pending);
                    }
                    job = pending;
                }
                Err(SendTimeoutError::Disconnected(pending)) => {
                    self.stats.accepted.fetch_sub(1, Ordering::Relaxed);
                    return self.discard(pending);
                }
            }
        }
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        if self.sender.lock().take().is_some() {
            debug!("Worker pool shutting down");
        }
    }

    fn shutdown_now(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.cancelled.store(true, Ordering::Release);
        self.sender.lock().take();

        let dropped = self.receiver.try_iter().count() as u64;
        self.stats.discarded.fetch_add(dropped, Ordering::Relaxed);
        info!(dropped = dropped, "Worker pool cancelled");
    }

    fn await_termination(&self) {
        let mut workers = self.workers.lock();
        for worker in workers.drain(..) {
            if worker.is_current_thread() {
                warn!(worker = worker.id, "Not joining worker from its own thread");
                continue;
            }
            if let Err(e) = worker.join() {
                warn!(error = %e, "Worker failed to join cleanly");
            }
        }
    }

    fn stats(&self) -> Arc<ExecutorStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Idle workers exit once the queue is closed; they are not joined here.
        self.sender.get_mut().take();
    }
}
