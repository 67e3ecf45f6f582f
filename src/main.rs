//! archive-walker - walk directories and archives
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use archive_walker::config::{CliArgs, IntakeConfig};
use archive_walker::handler::{ErrorHandler, FileHandler, ItemStream, SimpleErrorHandler};
use archive_walker::progress::{print_header, print_summary, IntakeProgress, ProgressReporter};
use archive_walker::walker::{Walker, WalkerPhase};
use clap::Parser;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Drains every item, counting files and bytes
struct IntakeHandler {
    progress: Arc<IntakeProgress>,
    list: bool,
}

impl FileHandler for IntakeHandler {
    fn directory(&self, _dir: &Path) -> anyhow::Result<()> {
        self.progress.record_dir();
        Ok(())
    }

    fn file(&self, path: &str, mut content: ItemStream, _origin: Option<&Path>) -> anyhow::Result<()> {
        let bytes = io::copy(&mut content, &mut io::sink())
            .with_context(|| format!("Failed to read {}", path))?;
        self.progress.record_file(bytes);
        if self.list {
            println!("{}", path);
        }
        Ok(())
    }
}

/// Counts failures before delegating to the console error handler
struct CountingErrorHandler {
    inner: SimpleErrorHandler,
    progress: Arc<IntakeProgress>,
}

impl ErrorHandler for CountingErrorHandler {
    fn error_occurred(&self, err: &anyhow::Error, path: &str, origin: Option<&Path>) -> bool {
        self.progress.record_error();
        self.inner.error_occurred(err, path, origin)
    }
}

/// Returns `Ok(false)` when the walk was aborted
fn run() -> Result<bool> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = IntakeConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            &config.input.display().to_string(),
            config.options.mode.worker_count(),
            config.name_pattern.as_str(),
        );
    }

    let progress = Arc::new(IntakeProgress::new());
    let walker = Walker::with_handlers(
        config.options,
        Arc::new(IntakeHandler {
            progress: Arc::clone(&progress),
            list: config.list,
        }),
        Arc::new(CountingErrorHandler {
            inner: SimpleErrorHandler::new(config.continue_on_error),
            progress: Arc::clone(&progress),
        }),
    )
    .context("Failed to initialize walker")?;
    walker.configure(config.walker_config());

    // Setup signal handler for early shutdown
    let abort_handle = walker.abort_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, aborting...");
        abort_handle.abort();
    })
    .context("Failed to set signal handler")?;

    // Listing conflicts with the spinner
    let reporter = if config.show_progress && !config.list {
        Some(ProgressReporter::new(Arc::clone(&progress)))
    } else {
        None
    };

    walker
        .process_path(&config.input)
        .with_context(|| format!("Cannot process {}", config.input.display()))?;
    walker.close();

    let aborted = walker.phase() == WalkerPhase::Aborted;
    if let Some(reporter) = reporter {
        if aborted {
            reporter.finish("Intake aborted");
        } else {
            reporter.finish("Intake completed");
        }
    }

    let stats = walker.stats();
    if config.show_progress {
        print_summary(&progress, &stats, aborted);
    }

    if aborted {
        info!("Intake was aborted before completion");
    } else if stats.failed > 0 {
        info!(errors = stats.failed, "Intake completed with errors");
    }

    Ok(!aborted)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("archive_walker=debug,warn")
    } else {
        EnvFilter::new("archive_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(io::stderr)
        .init();

    Ok(())
}
