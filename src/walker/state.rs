//! Close/abort lifecycle of a walker
//!
//! ```text
//!   Active ──close()──▶ Closing ──(workers drained)──▶ Closed
//!     │                    │
//!     └──abort() / fatal handler error──▶ Aborted ◀────┘
//! ```
//!
//! `closed` is read on every step of the traversal without locking.
//! Both flags are only ever set while holding `guard`, which also
//! serialises error reporting so the first fatal error wins.
//! The guard is re-entrant: an error handler may call `abort()` itself.

use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Observable lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerPhase {
    /// Accepting work
    Active,
    /// `close()` is waiting for submitted work to finish
    Closing,
    /// Closed gracefully; all submitted work has finished
    Closed,
    /// Aborted; queued work was dropped
    Aborted,
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    /// Stop doing new work
    closed: AtomicBool,

    /// Set once `close()` finished waiting
    drained: AtomicBool,

    /// An abort has been triggered. Implies `closed`.
    guard: ReentrantMutex<Cell<bool>>,
}

impl Lifecycle {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.guard.lock().get()
    }

    /// Mark as closed. Returns `true` for the first caller only.
    pub(crate) fn begin_close(&self) -> bool {
        let _guard = self.guard.lock();
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn finish_close(&self) {
        self.drained.store(true, Ordering::Release);
    }

    /// Mark as closed and aborted. Returns `true` for the first caller only.
    ///
    /// A walker that finished closing cannot be aborted any more.
    pub(crate) fn begin_abort(&self) -> bool {
        let aborted = self.guard.lock();
        if aborted.get() || self.drained.load(Ordering::Acquire) {
            return false;
        }
        self.closed.store(true, Ordering::Release);
        aborted.set(true);
        true
    }

    /// Report a failure under the guard, unless an abort already happened
    ///
    /// `report` returns whether processing should continue. Returns `true`
    /// if this call turned the failure into an abort; the caller then owns
    /// tearing down the executor.
    pub(crate) fn report_failure<F>(&self, report: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let aborted = self.guard.lock();
        if aborted.get() {
            return false;
        }
        if report() {
            return false;
        }
        // The handler may have aborted re-entrantly while we held the guard.
        self.begin_abort()
    }

    pub(crate) fn phase(&self) -> WalkerPhase {
        if self.is_aborted() {
            WalkerPhase::Aborted
        } else if !self.is_closed() {
            WalkerPhase::Active
        } else if self.drained.load(Ordering::Acquire) {
            WalkerPhase::Closed
        } else {
            WalkerPhase::Closing
        }
    }
}
