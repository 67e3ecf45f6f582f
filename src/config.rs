//! Configuration types for archive-walker
//!
//! This module defines:
//! - Traversal settings (name pattern, recursion switches)
//! - Construction-time options including the execution mode
//! - CLI argument parsing using clap derive macros
//! - Validated runtime configuration for the binary

use crate::error::ConfigError;
use crate::pattern::NamePattern;
use clap::Parser;
use std::path::PathBuf;

/// Maximum reasonable worker count
const MAX_THREADS: usize = 512;

/// Traversal settings of a [`Walker`](crate::walker::Walker)
///
/// Only change these while no traversal is in flight.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Filter applied to item base names (never to directories)
    pub name_pattern: NamePattern,

    /// Descend into subdirectories of the input directory
    pub recurse_subdirs: bool,

    /// Treat `.zip`, `.tar.gz` and `.tgz` items as containers.
    /// Independent of `recurse_subdirs`.
    pub recurse_archives: bool,

    /// Skip `Thumbs.db` and `.DS_Store`
    pub skip_os_junk_files: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            name_pattern: NamePattern::any(),
            recurse_subdirs: true,
            recurse_archives: true,
            skip_os_junk_files: true,
        }
    }
}

/// How handler jobs are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run every job on the submitting thread, at submission time
    Inline,

    /// Run jobs on a fixed pool of worker threads
    Pooled { threads: usize },
}

impl ExecutionMode {
    /// Pool sized to leave one core for the driver thread
    pub fn pooled() -> Self {
        ExecutionMode::Pooled {
            threads: default_pool_size(),
        }
    }

    /// Map a requested thread count to a mode
    ///
    /// `1` or less selects inline execution. Larger values select a pool of
    /// at most `cores - 1` workers, but at least one.
    pub fn from_thread_count(requested: usize) -> Self {
        if requested <= 1 {
            ExecutionMode::Inline
        } else {
            ExecutionMode::Pooled {
                threads: requested.min(default_pool_size()).max(1),
            }
        }
    }

    /// Number of threads that run handler jobs
    pub fn worker_count(&self) -> usize {
        match self {
            ExecutionMode::Inline => 1,
            ExecutionMode::Pooled { threads } => (*threads).max(1),
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::pooled()
    }
}

fn default_pool_size() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Construction-time options of a [`Walker`](crate::walker::Walker)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkerOptions {
    pub mode: ExecutionMode,
    pub recurse_subdirs: bool,
    pub recurse_archives: bool,
    pub skip_os_junk_files: bool,
}

impl WalkerOptions {
    /// Options with all traversal switches on
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            recurse_subdirs: true,
            recurse_archives: true,
            skip_os_junk_files: true,
        }
    }

    pub fn recurse_subdirs(mut self, recurse: bool) -> Self {
        self.recurse_subdirs = recurse;
        self
    }

    pub fn recurse_archives(mut self, recurse: bool) -> Self {
        self.recurse_archives = recurse;
        self
    }

    pub fn skip_os_junk_files(mut self, skip: bool) -> Self {
        self.skip_os_junk_files = skip;
        self
    }

    /// Initial traversal settings derived from these options
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            name_pattern: NamePattern::any(),
            recurse_subdirs: self.recurse_subdirs,
            recurse_archives: self.recurse_archives,
            skip_os_junk_files: self.skip_os_junk_files,
        }
    }
}

impl Default for WalkerOptions {
    fn default() -> Self {
        Self::new(ExecutionMode::default())
    }
}

/// Walk a directory tree, including the contents of archives
#[derive(Parser, Debug, Clone)]
#[command(
    name = "archive-walker",
    version,
    about = "Walk a directory tree, including files inside .zip, .tar.gz/.tgz and .gz archives",
    long_about = "Walks the input path in a fixed order (directories first, then case-insensitive\n\
                  name order), unpacks archives on the fly and hands every matching item to a\n\
                  pool of worker threads.",
    after_help = "EXAMPLES:\n    \
        archive-walker ./corpus --glob '*.xml'\n    \
        archive-walker ./corpus.tar.gz --list -t 1\n    \
        archive-walker ./data --no-recurse --no-archives --continue-on-error"
)]
pub struct CliArgs {
    /// File, directory or archive to process
    #[arg(value_name = "PATH")]
    pub input: PathBuf,

    /// Only handle items whose name matches this glob
    #[arg(short = 'g', long, default_value = "*", value_name = "GLOB", conflicts_with = "regex")]
    pub glob: String,

    /// Only handle items whose name matches this regular expression
    #[arg(long, value_name = "REGEX")]
    pub regex: Option<String>,

    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recurse: bool,

    /// Do not unpack .zip, .tar.gz and .tgz archives
    #[arg(long)]
    pub no_archives: bool,

    /// Also handle Thumbs.db and .DS_Store
    #[arg(long)]
    pub keep_os_files: bool,

    /// Number of worker threads (1 = process on the calling thread)
    #[arg(
        short = 't',
        long,
        default_value_t = default_pool_size(),
        value_name = "NUM"
    )]
    pub threads: usize,

    /// Keep going after a handler fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Print every handled item
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration for the binary
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Input path
    pub input: PathBuf,

    /// Construction-time walker options
    pub options: WalkerOptions,

    /// Compiled name filter
    pub name_pattern: NamePattern,

    /// Keep going after handler failures
    pub continue_on_error: bool,

    /// Print handled items
    pub list: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl IntakeConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.threads == 0 || args.threads > MAX_THREADS {
            return Err(ConfigError::InvalidThreadCount {
                count: args.threads,
                max: MAX_THREADS,
            });
        }

        if !args.input.exists() {
            return Err(ConfigError::InvalidInput {
                path: args.input.clone(),
                reason: "path does not exist".to_string(),
            });
        }

        let name_pattern = match &args.regex {
            Some(regex) => NamePattern::regex(regex)?,
            None => NamePattern::glob(&args.glob)?,
        };

        let options = WalkerOptions::new(ExecutionMode::from_thread_count(args.threads))
            .recurse_subdirs(!args.no_recurse)
            .recurse_archives(!args.no_archives)
            .skip_os_junk_files(!args.keep_os_files);

        Ok(Self {
            input: args.input,
            options,
            name_pattern,
            continue_on_error: args.continue_on_error,
            list: args.list,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Traversal settings for the walker
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            name_pattern: self.name_pattern.clone(),
            ..self.options.walker_config()
        }
    }
}
