//! Tree and archive walker
//!
//! The walker splits the work in two roles:
//!
//! ```text
//!   driver (caller thread)                         workers (Executor)
//!  ┌───────────────────────────────┐
//!  │ process_path                  │
//!  │  ├─ list children (sorted)    │  directory(child) ┌───────────────┐
//!  │  ├─ child dir ────────────────┼──────────────────▶│ FileHandler   │
//!  │  │    └─ recurse if enabled   │                   │  .directory   │
//!  │  └─ child file                │                   │  .file        │
//!  │       └─ process_stream       │  file(item)       └──────┬────────┘
//!  │            ├─ archive? ───────┼─ for_each_entry          │ Err / panic
//!  │            │   └─ recurse     │                          ▼
//!  │            └─ item ───────────┼──────────────────▶ report_and_abort
//!  └───────────────────────────────┘                    │ ErrorHandler
//!          ▲  polls `closed`                            │ false ⇒ abort()
//!          └────────────────────────────────────────────┘
//! ```
//!
//! The driver never waits for handlers. Cancellation is cooperative: the
//! driver checks the `closed` flag before every directory child and after
//! every archive entry, and `abort()` empties the executor's queue.
//!
//! Jobs only hold a `Weak` reference back to the walker: the executor's
//! queue lives inside the walker, so a strong one would form a cycle.

pub mod listing;
pub mod state;

pub use listing::{list_sorted, Child};
pub use state::WalkerPhase;

use crate::archive::ArchiveKind;
use crate::config::{WalkerConfig, WalkerOptions};
use crate::error::{ArchiveError, Result, WalkerError};
use crate::executor::{self, Executor, Job};
use crate::handler::{ErrorHandler, FileHandler, ItemStream, SimpleErrorHandler};
use crate::pattern::NamePattern;
use parking_lot::RwLock;
use state::Lifecycle;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// Files created by Windows and macOS that never hold content
const OS_JUNK_FILES: [&str; 2] = ["Thumbs.db", ".DS_Store"];

/// Last component of an item path (file system or archive path)
pub fn base_name(path: &str) -> &str {
    path.rsplit(|c: char| c == '/' || c == MAIN_SEPARATOR)
        .next()
        .unwrap_or(path)
}

/// Whether a base name is an OS bookkeeping file
pub fn is_os_junk(name: &str) -> bool {
    OS_JUNK_FILES.contains(&name)
}

/// Driver-side counters; job outcomes are counted by the executor
#[derive(Debug, Default)]
struct WalkCounters {
    directories: AtomicU64,
    archives: AtomicU64,
    skipped: AtomicU64,
}

/// Snapshot of walk statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Child directories handed to the handler
    pub directories: u64,

    /// Jobs (directories and items) accepted by the executor
    pub submitted: u64,

    /// Jobs whose handler returned successfully
    pub completed: u64,

    /// Jobs whose handler failed or panicked
    pub failed: u64,

    /// Jobs dropped by an abort before they ran
    pub discarded: u64,

    /// Archives opened, including plain gzip files
    pub archives: u64,

    /// Items skipped as OS junk or by the name pattern
    pub skipped: u64,
}

struct Handlers {
    file: Arc<dyn FileHandler>,
    error: Arc<dyn ErrorHandler>,
}

/// State shared between the driver and the jobs it submits
struct Shared {
    config: RwLock<WalkerConfig>,
    handlers: RwLock<Handlers>,
    executor: Arc<dyn Executor>,
    state: Lifecycle,
    counters: WalkCounters,
}

impl Shared {
    fn walk(self: &Arc<Self>, path: &Path) {
        if self.state.is_closed() {
            return;
        }

        if path.is_dir() {
            self.process_dir(path);
        } else if path.is_file() {
            self.process_file(path);
        } else {
            debug!(path = %path.display(), "Skipping special file");
        }
    }

    fn process_dir(self: &Arc<Self>, dir: &Path) {
        let children = match list_sorted(dir) {
            Ok(children) => children,
            Err(e) => {
                self.report_and_abort(e.into(), &dir.display().to_string(), Some(dir));
                return;
            }
        };

        let recurse_subdirs = self.config.read().recurse_subdirs;

        for child in children {
            if self.state.is_closed() {
                return;
            }

            if child.is_dir {
                self.submit_directory(&child.path);
                if recurse_subdirs {
                    self.walk(&child.path);
                }
            } else {
                self.walk(&child.path);
            }
        }
    }

    fn process_file(self: &Arc<Self>, path: &Path) {
        let name = path.to_string_lossy();
        match File::open(path) {
            Ok(file) => self.process_stream(&name, Box::new(BufReader::new(file)), Some(path)),
            Err(e) => self.report_and_abort(e.into(), &name, Some(path)),
        }
    }

    fn process_stream(self: &Arc<Self>, name: &str, stream: ItemStream, origin: Option<&Path>) {
        if self.state.is_closed() {
            return;
        }

        let config = self.config.read().clone();
        match ArchiveKind::detect(name, config.recurse_archives) {
            Some(kind) => self.process_archive(kind, name, stream, origin),
            None => self.submit_item(name, stream, origin, &config),
        }
    }

    fn process_archive(
        self: &Arc<Self>,
        kind: ArchiveKind,
        name: &str,
        mut stream: ItemStream,
        origin: Option<&Path>,
    ) {
        debug!(archive = %name, kind = kind.as_str(), "Opening archive");
        self.counters.archives.fetch_add(1, Ordering::Relaxed);

        // Entries are buffered so they can be moved to worker threads.
        let result = kind.source().for_each_entry(name, &mut stream, &mut |entry_path, content| {
            let mut bytes = Vec::new();
            match content.read_to_end(&mut bytes) {
                Ok(_) => self.process_stream(entry_path, Box::new(Cursor::new(bytes)), origin),
                Err(e) => self.report_and_abort(ArchiveError::read(entry_path, e).into(), entry_path, origin),
            }
            !self.state.is_closed()
        });

        if let Err(e) = result {
            self.report_and_abort(e.into(), name, origin);
        }
    }

    fn submit_directory(self: &Arc<Self>, dir: &Path) {
        self.counters.directories.fetch_add(1, Ordering::Relaxed);
        let handler = Arc::clone(&self.handlers.read().file);
        let dir_path = dir.to_path_buf();

        self.submit(dir.display().to_string(), Some(dir.to_path_buf()), move || {
            handler.directory(&dir_path)
        });
    }

    fn submit_item(
        self: &Arc<Self>,
        name: &str,
        stream: ItemStream,
        origin: Option<&Path>,
        config: &WalkerConfig,
    ) {
        let base = base_name(name);
        if config.skip_os_junk_files && is_os_junk(base) {
            debug!(item = %name, "Skipping OS junk file");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if !config.name_pattern.matches(base) {
            trace!(item = %name, pattern = config.name_pattern.as_str(), "Name does not match");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let handler = Arc::clone(&self.handlers.read().file);
        let item_path = name.to_string();
        let item_origin = origin.map(Path::to_path_buf);

        self.submit(name.to_string(), origin.map(Path::to_path_buf), move || {
            handler.file(&item_path, stream, item_origin.as_deref())
        });
    }

    /// Hand work to the executor, routing failures back to the walker
    fn submit<W>(self: &Arc<Self>, label: String, origin: Option<PathBuf>, work: W)
    where
        W: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        trace!(item = %label, "Submitting job");

        let walker = Arc::downgrade(self);
        let failed_path = label.clone();

        self.executor.submit(Job::new(label, work, move |err| match walker.upgrade() {
            Some(shared) => shared.report_and_abort(err, &failed_path, origin.as_deref()),
            None => warn!(path = %failed_path, error = %err, "Walker gone, failure not reported"),
        }));
    }

    /// Tell the error handler about the first fatal failure and abort if asked
    fn report_and_abort(&self, err: anyhow::Error, path: &str, origin: Option<&Path>) {
        let error_handler = Arc::clone(&self.handlers.read().error);
        let aborting = self
            .state
            .report_failure(|| error_handler.error_occurred(&err, path, origin));

        if aborting {
            warn!(path = %path, error = %err, "Aborting after fatal error");
            self.executor.shutdown_now();
        }
    }

    fn abort(&self) {
        if self.state.begin_abort() {
            info!("Walker aborted");
            self.executor.shutdown_now();
        }
    }

    fn close(&self) {
        if !self.state.begin_close() {
            return;
        }

        debug!("Closing walker, waiting for submitted work");
        self.executor.shutdown();
        self.executor.await_termination();
        self.state.finish_close();

        let stats = self.stats();
        info!(
            submitted = stats.submitted,
            completed = stats.completed,
            failed = stats.failed,
            "Walker closed"
        );
    }

    fn stats(&self) -> WalkStats {
        let jobs = self.executor.stats();
        WalkStats {
            directories: self.counters.directories.load(Ordering::Relaxed),
            submitted: jobs.accepted.load(Ordering::Relaxed),
            completed: jobs.succeeded.load(Ordering::Relaxed),
            failed: jobs.failed.load(Ordering::Relaxed),
            discarded: jobs.discarded_count(),
            archives: self.counters.archives.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Walks files, directories and archives, dispatching matched items
///
/// A walker is driven through any number of `process_path` /
/// `process_stream` calls and then terminated once with [`close`] or
/// [`abort`]. After that every operation is a no-op. Dropping the walker
/// closes it.
///
/// [`close`]: Walker::close
/// [`abort`]: Walker::abort
pub struct Walker {
    shared: Arc<Shared>,
}

impl Walker {
    /// Create a walker with the default error handler (report, then abort)
    pub fn new(options: WalkerOptions, file_handler: Arc<dyn FileHandler>) -> Result<Self> {
        Self::with_handlers(options, file_handler, Arc::new(SimpleErrorHandler::new(false)))
    }

    pub fn with_handlers(
        options: WalkerOptions,
        file_handler: Arc<dyn FileHandler>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Result<Self> {
        let executor = executor::for_mode(options.mode)?;
        info!(
            mode = ?options.mode,
            recurse_subdirs = options.recurse_subdirs,
            recurse_archives = options.recurse_archives,
            "Walker created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config: RwLock::new(options.walker_config()),
                handlers: RwLock::new(Handlers {
                    file: file_handler,
                    error: error_handler,
                }),
                executor,
                state: Lifecycle::default(),
                counters: WalkCounters::default(),
            }),
        })
    }

    /// Replace all traversal settings
    pub fn configure(&self, config: WalkerConfig) {
        *self.shared.config.write() = config;
    }

    /// Current traversal settings
    pub fn config(&self) -> WalkerConfig {
        self.shared.config.read().clone()
    }

    /// Only handle items whose base name matches `glob`
    pub fn set_name_glob(&self, glob: &str) -> Result<()> {
        self.set_name_pattern(NamePattern::glob(glob)?);
        Ok(())
    }

    pub fn set_name_pattern(&self, pattern: NamePattern) {
        self.shared.config.write().name_pattern = pattern;
    }

    pub fn set_recurse_subdirs(&self, recurse: bool) {
        self.shared.config.write().recurse_subdirs = recurse;
    }

    pub fn set_recurse_archives(&self, recurse: bool) {
        self.shared.config.write().recurse_archives = recurse;
    }

    pub fn set_skip_os_junk_files(&self, skip: bool) {
        self.shared.config.write().skip_os_junk_files = skip;
    }

    pub fn set_handlers(&self, file_handler: Arc<dyn FileHandler>, error_handler: Arc<dyn ErrorHandler>) {
        let mut handlers = self.shared.handlers.write();
        handlers.file = file_handler;
        handlers.error = error_handler;
    }

    pub fn set_file_handler(&self, file_handler: Arc<dyn FileHandler>) {
        self.shared.handlers.write().file = file_handler;
    }

    pub fn set_error_handler(&self, error_handler: Arc<dyn ErrorHandler>) {
        self.shared.handlers.write().error = error_handler;
    }

    /// Process a file, directory or archive
    ///
    /// All immediate children of a directory are processed; deeper levels
    /// only with `recurse_subdirs`. Fails only if `path` does not exist.
    /// Failures further down are reported to the error handler.
    pub fn process_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WalkerError::NotFound {
                path: path.to_path_buf(),
            });
        }

        self.shared.walk(path);
        Ok(())
    }

    /// Process a named stream, which may be an archive or a single item
    ///
    /// `origin` is the file the stream was read from, if any. It is passed
    /// on to the handlers for every item found in the stream.
    pub fn process_stream(&self, name: &str, stream: ItemStream, origin: Option<&Path>) {
        self.shared.process_stream(name, stream, origin);
    }

    /// Stop taking new work and wait for submitted work to finish
    ///
    /// Must not be called from inside a handler.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Stop taking new work and drop queued work, without waiting
    ///
    /// Safe to call from any thread, also while another thread is in
    /// `close()`.
    pub fn abort(&self) {
        self.shared.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.is_closed()
    }

    pub fn phase(&self) -> WalkerPhase {
        self.shared.state.phase()
    }

    pub fn stats(&self) -> WalkStats {
        self.shared.stats()
    }

    /// Handle that can abort this walker from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl Drop for Walker {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Aborts a walker from another thread (signal handlers, watchdogs)
#[derive(Clone)]
pub struct AbortHandle {
    shared: Weak<Shared>,
}

impl AbortHandle {
    /// Abort the walker if it still exists
    pub fn abort(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.state.is_closed())
            .unwrap_or(true)
    }
}
