//! Progress reporting for the command line tool
//!
//! Handler threads bump the counters in [`IntakeProgress`]; a background
//! ticker thread renders them into an indicatif spinner.

use crate::walker::WalkStats;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Counters updated by the item handler
#[derive(Debug)]
pub struct IntakeProgress {
    pub files: AtomicU64,
    pub dirs: AtomicU64,
    pub bytes: AtomicU64,
    pub errors: AtomicU64,
    started: Instant,
}

impl IntakeProgress {
    pub fn new() -> Self {
        Self {
            files: AtomicU64::new(0),
            dirs: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_file(&self, bytes: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_dir(&self) {
        self.dirs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Files handled per second since creation
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.files.load(Ordering::Relaxed) as f64 / secs
        } else {
            0.0
        }
    }

    fn message(&self) -> String {
        format!(
            "Dirs: {} | Files: {} | Size: {} | Rate: {:.0}/s | Errors: {}",
            format_number(self.dirs.load(Ordering::Relaxed)),
            format_number(self.files.load(Ordering::Relaxed)),
            format_size(self.bytes.load(Ordering::Relaxed), BINARY),
            self.files_per_second(),
            format_number(self.errors.load(Ordering::Relaxed)),
        )
    }
}

impl Default for IntakeProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Spinner that periodically redraws an [`IntakeProgress`]
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,

    /// Stop signal for the ticker
    stop: Arc<AtomicBool>,

    ticker: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Create a reporter and start redrawing `progress`
    pub fn new(progress: Arc<IntakeProgress>) -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        bar.enable_steady_tick(REFRESH_INTERVAL);

        let stop = Arc::new(AtomicBool::new(false));
        let ticker = {
            let bar = bar.clone();
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("progress".into())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        bar.set_message(progress.message());
                        thread::sleep(REFRESH_INTERVAL);
                    }
                })
                .ok()
        };

        Self { bar, stop, ticker }
    }

    /// Finish the progress display with a final message
    pub fn finish(mut self, message: &str) {
        self.stop_ticker();
        self.bar.finish_with_message(message.to_string());
    }

    fn stop_ticker(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a summary of the run
pub fn print_summary(progress: &IntakeProgress, stats: &WalkStats, aborted: bool) {
    let duration_secs = progress.elapsed().as_secs_f64();
    let files = progress.files.load(Ordering::Relaxed);
    let errors = progress.errors.load(Ordering::Relaxed);

    println!();
    if aborted {
        println!("{}", style("Intake Aborted").red().bold());
    } else {
        println!("{}", style("Intake Complete").green().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(progress.dirs.load(Ordering::Relaxed))
    );
    println!("  {} {}", style("Files:").bold(), format_number(files));
    println!("  {} {}", style("Archives:").bold(), format_number(stats.archives));
    println!("  {} {}", style("Skipped:").bold(), format_number(stats.skipped));
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(progress.bytes.load(Ordering::Relaxed), BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        progress.files_per_second()
    );
    if errors > 0 {
        println!("  {} {}", style("Errors:").yellow().bold(), format_number(errors));
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(input: &str, workers: usize, pattern: &str) {
    println!();
    println!(
        "{} {}",
        style("archive-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), input);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Pattern:").bold(), pattern);
    println!();
}
