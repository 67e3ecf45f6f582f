//! Pluggable policies consumed by the walker
//!
//! - [`FileHandler`] receives matched directories and items. It may be
//!   called from several worker threads at once.
//! - [`ErrorHandler`] is told about failures and decides whether the walk
//!   continues or is aborted.

use std::io::Read;
use std::path::Path;
use tracing::error;

/// Byte stream of one item, owned by the handler that receives it
///
/// Dropping the stream closes it.
pub type ItemStream = Box<dyn Read + Send>;

/// What to do with every visited directory and matched item
pub trait FileHandler: Send + Sync {
    /// Called once per visited child directory (never for the input itself,
    /// never for directories inside archives). The name pattern is not
    /// applied to directories.
    fn directory(&self, dir: &Path) -> anyhow::Result<()>;

    /// Called once per matched item
    ///
    /// `path` includes the path inside archives for archive entries.
    /// `origin` is the file the stream came from, or the archive that
    /// contains it.
    fn file(&self, path: &str, content: ItemStream, origin: Option<&Path>) -> anyhow::Result<()>;
}

/// Reports errors and decides whether to continue
pub trait ErrorHandler: Send + Sync {
    /// Return `true` to keep processing, `false` to abort the walk
    fn error_occurred(&self, error: &anyhow::Error, path: &str, origin: Option<&Path>) -> bool;
}

/// Prints the error and the offending path to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleErrorHandler {
    continue_on_error: bool,
}

impl SimpleErrorHandler {
    pub fn new(continue_on_error: bool) -> Self {
        Self { continue_on_error }
    }

    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }
}

impl ErrorHandler for SimpleErrorHandler {
    fn error_occurred(&self, err: &anyhow::Error, path: &str, origin: Option<&Path>) -> bool {
        let location = origin
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| path.to_string());

        error!(path = %path, error = %err, "Error processing item");
        eprintln!("Error processing file {}", location);
        eprintln!("{:?}", err);

        self.continue_on_error
    }
}

impl<F> FileHandler for F
where
    F: Fn(&str, ItemStream, Option<&Path>) -> anyhow::Result<()> + Send + Sync,
{
    fn directory(&self, _dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn file(&self, path: &str, content: ItemStream, origin: Option<&Path>) -> anyhow::Result<()> {
        self(path, content, origin)
    }
}
