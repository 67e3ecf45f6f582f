//! Error types for archive-walker
//!
//! This module defines the error hierarchy for:
//! - Tree traversal setup (missing root, unreadable paths)
//! - Archive decoding (tar-gzip, zip, gzip)
//! - Configuration and CLI validation
//! - Worker pool management
//!
//! Handler failures are not part of this hierarchy. Handlers return
//! `anyhow::Result<()>` and the original error is handed to the
//! [`ErrorHandler`](crate::handler::ErrorHandler) untouched.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the archive-walker library
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Root path passed to `process_path` does not exist
    #[error("Input file or directory not found: '{}'", path.display())]
    NotFound { path: PathBuf },

    /// Archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker pool errors
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
}

/// Errors raised while iterating the entries of an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Underlying read or decompression failure
    #[error("Failed to read archive '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed zip container
    #[error("Invalid zip archive '{name}': {source}")]
    Zip {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// Requested entry is not present in the archive
    #[error("Entry '{entry}' not found in archive '{}'", archive.display())]
    EntryNotFound { archive: PathBuf, entry: String },

    /// File name does not denote a supported archive type
    #[error("Unsupported archive type: '{name}'")]
    Unsupported { name: String },
}

impl ArchiveError {
    pub(crate) fn read(name: &str, source: std::io::Error) -> Self {
        ArchiveError::Read {
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn zip(name: &str, source: zip::result::ZipError) -> Self {
        ArchiveError::Zip {
            name: name.to_string(),
            source,
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Glob or regular expression failed to compile
    #[error("Invalid name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Invalid worker thread count
    #[error("Invalid thread count {count}: must be between 1 and {max}")]
    InvalidThreadCount { count: usize, max: usize },

    /// Root path unusable
    #[error("Invalid input path '{}': {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Worker thread could not be started
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },

    /// Worker thread panicked outside of a job
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for ArchiveError
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
