//! dircmp - compare two directory snapshots file by file.
//!
//! Usage:
//!   dircmp scan <DIR>                 Scan one tree and emit it as JSON
//!   dircmp compare <SOURCE> <TARGET>  Classify every file of two trees
//!   dircmp pairs <PAIRS.json>         Compare an explicit list of file pairs
//!   dircmp --help                     Show help

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dircmp_compare::{ComparisonReport, FilePair, PairComparer, ScanReport};
use dircmp_core::{ScanConfig, DEFAULT_CHUNK_SIZE};
use dircmp_scan::{ProgressConfig, ProgressTicker, ScanOutcome, ScanProgress, TreeScanner};

/// Exit status when `--strict` is set and something could not be read.
const STRICT_FAILURE_EXIT: u8 = 2;

#[derive(Parser)]
#[command(
    name = "dircmp",
    version,
    about = "Compare two directory snapshots by path and content",
    long_about = "dircmp scans directory trees, checksums every file with CRC-32 and \
                  classifies each file as Equal, Modified, Moved, Added, Deleted, \
                  Duplicated or Deduplicated.\n\n\
                  Results are written as JSON to stdout or to the file given with -o."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Hash files on a thread pool
    #[arg(long, global = true)]
    parallel: bool,

    /// Number of hashing threads (0 = one per core)
    #[arg(long, global = true, default_value = "0")]
    threads: usize,

    /// Follow symbolic links
    #[arg(long, global = true)]
    follow_symlinks: bool,

    /// Read buffer size in bytes used for checksumming
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Do not render the progress line
    #[arg(long, global = true)]
    no_progress: bool,

    /// Exit with status 2 if any file or directory could not be read
    #[arg(long, global = true)]
    strict: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scan one directory tree
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare a source tree against a target tree
    Compare {
        /// Original tree
        source: PathBuf,

        /// Tree to compare against the source
        target: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare file pairs listed in a JSON file
    Pairs {
        /// JSON array of {"a": path, "b": path} records
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn scan_config(&self, root: &Path) -> Result<ScanConfig> {
        ScanConfig::builder()
            .root(root)
            .follow_symlinks(self.follow_symlinks)
            .chunk_size(self.chunk_size)
            .parallel_hashing(self.parallel)
            .threads(self.threads)
            .build()
            .wrap_err("Invalid scan options")
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    let had_failures = match &cli.command {
        Command::Scan { path, output } => run_scan(&cli, path, output.as_deref(), &cancel).await?,
        Command::Compare {
            source,
            target,
            output,
        } => run_compare(&cli, source, target, output.as_deref(), &cancel).await?,
        Command::Pairs { input, output } => run_pairs(&cli, input, output.as_deref()).await?,
    };

    if had_failures && cli.strict {
        tracing::error!("finished with read failures");
        return Ok(ExitCode::from(STRICT_FAILURE_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose, quiet)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn default_log_level(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

/// Scan and emit a single tree.
async fn run_scan(
    cli: &Cli,
    path: &Path,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<bool> {
    let outcome = scan_tree(cli, path, "scan", cancel).await?;
    let report = ScanReport::from(outcome);

    write_output(&report, output)?;
    eprintln!(
        "{} files, {} directories, {}",
        report.tree.stats.total_files,
        report.tree.stats.total_dirs,
        format_size(report.tree.stats.total_size)
    );
    Ok(report.has_failures())
}

/// Scan both trees, one after the other, and classify them.
async fn run_compare(
    cli: &Cli,
    source: &Path,
    target: &Path,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<bool> {
    let source_outcome = scan_tree(cli, source, "source", cancel).await?;
    let target_outcome = scan_tree(cli, target, "target", cancel).await?;

    let report = ComparisonReport::from_outcomes(source_outcome, target_outcome)
        .wrap_err("Failed to classify trees")?;

    write_output(&report, output)?;
    eprint!("{}", report.summary);
    if report.summary.is_identical() {
        eprintln!("Trees are identical");
    }
    if report.has_failures() {
        eprintln!("{} path(s) could not be read", report.failures.len());
    }
    Ok(report.has_failures())
}

/// Compare explicit file pairs.
async fn run_pairs(cli: &Cli, input: &Path, output: Option<&Path>) -> Result<bool> {
    let text = std::fs::read_to_string(input)
        .wrap_err_with(|| format!("Failed to read {}", input.display()))?;
    let pairs: Vec<FilePair> = serde_json::from_str(&text)
        .wrap_err_with(|| format!("Invalid pair list in {}", input.display()))?;

    let comparer = PairComparer::new(&cli.scan_config(Path::new("."))?);
    let outcomes = tokio::task::spawn_blocking(move || comparer.compare_all(&pairs))
        .await
        .wrap_err("Pair comparison task failed")?;

    write_output(&outcomes, output)?;
    let failed = outcomes.iter().filter(|o| o.failure.is_some()).count();
    eprintln!("{} pair(s) compared, {} failed", outcomes.len(), failed);
    Ok(failed > 0)
}

/// Run one scan on the blocking pool while the ticker renders progress.
async fn scan_tree(
    cli: &Cli,
    root: &Path,
    label: &'static str,
    cancel: &CancellationToken,
) -> Result<ScanOutcome> {
    let scanner =
        Arc::new(TreeScanner::new(cli.scan_config(root)?).with_cancellation(cancel.clone()));

    let ticker = (!cli.no_progress).then(|| {
        ProgressTicker::spawn(
            scanner.progress(),
            ProgressConfig::default(),
            move |progress: &ScanProgress| {
                eprint!("\r\x1b[2K{}", render_progress(label, progress));
                let _ = io::stderr().flush();
            },
        )
    });

    let worker = Arc::clone(&scanner);
    let result = tokio::task::spawn_blocking(move || worker.scan()).await;

    if let Some(ticker) = ticker {
        ticker.stop().await;
        eprint!("\r\x1b[2K");
    }

    result
        .wrap_err("Scan task failed")?
        .wrap_err_with(|| format!("Failed to scan {}", root.display()))
}

/// One-line progress summary.
fn render_progress(label: &str, progress: &ScanProgress) -> String {
    let mut line = format!(
        "{label} [{}] {} files, {}",
        progress.phase,
        progress.current_count,
        format_size(progress.current_bytes)
    );
    if let Some(percent) = progress.percentage() {
        line.push_str(&format!(" ({percent:.0}%)"));
    }
    if progress.failures > 0 {
        line.push_str(&format!(", {} failed", progress.failures));
    }
    if let Some(slow) = &progress.slow_file {
        line.push_str(&format!(" - Processing file {}", slow.display()));
    }
    line
}

/// Write pretty JSON to `output`, or stdout.
fn write_output<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => {
            println!("{json}");
        }
    }
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
