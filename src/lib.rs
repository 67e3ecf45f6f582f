//! archive-walker - Directory and archive traversal for document intake
//!
//! Walks a file, a directory tree or a stream and hands every matching item
//! to a user-supplied handler. Archives found on the way (`.zip`, `.tar.gz`,
//! `.tgz`) are opened and walked as if they were directories; plain `.gz`
//! files are decompressed transparently.
//!
//! # Features
//!
//! - **Deterministic order**: directories are listed directories first,
//!   then by case-insensitive name, so inline runs are reproducible.
//!
//! - **Parallel handlers**: item handlers run on a pool of worker threads
//!   behind a bounded queue, or inline on the caller for single-threaded
//!   operation.
//!
//! - **First error wins**: handler failures go to an error handler that
//!   decides whether to continue. Aborting stops the traversal and drops
//!   queued work.
//!
//! # Architecture
//!
//! ```text
//!        path / stream
//!              │
//!              ▼
//! ┌──────────────────────────────┐      ┌───────────────────────────┐
//! │ Walker (driver thread)       │      │ archive                   │
//! │  - sorted directory listing  │─────▶│  TarGzSource  ZipSource   │
//! │  - name pattern / OS junk    │◀─────│  GzipSource               │
//! │  - closed flag polling       │      └───────────────────────────┘
//! └──────────────┬───────────────┘
//!                │ Job
//!                ▼
//! ┌──────────────────────────────┐
//! │ Executor                     │
//! │  WorkerPool (crossbeam)      │
//! │  InlineExecutor              │
//! └──────────────┬───────────────┘
//!                │
//!                ▼
//!   FileHandler ──Err──▶ ErrorHandler ──false──▶ abort
//! ```
//!
//! # Example
//!
//! ```no_run
//! use archive_walker::{ExecutionMode, ItemStream, Walker, WalkerOptions};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let handler = |path: &str, _content: ItemStream, _origin: Option<&Path>| -> anyhow::Result<()> {
//!     println!("{}", path);
//!     Ok(())
//! };
//!
//! let walker = Walker::new(WalkerOptions::new(ExecutionMode::pooled()), Arc::new(handler))?;
//! walker.set_name_glob("*.xml")?;
//! walker.process_path("corpus")?;
//! walker.close();
//! # Ok::<(), archive_walker::WalkerError>(())
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
pub mod pattern;
pub mod progress;
pub mod walker;

pub use archive::{fetch_file_from_archive, ArchiveKind};
pub use config::{ExecutionMode, WalkerConfig, WalkerOptions};
pub use error::{ArchiveError, ConfigError, Result, WalkerError};
pub use handler::{ErrorHandler, FileHandler, ItemStream, SimpleErrorHandler};
pub use pattern::NamePattern;
pub use walker::{AbortHandle, WalkStats, Walker, WalkerPhase};
