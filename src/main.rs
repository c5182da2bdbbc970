//! filegate - Concurrent file scanner that flags files against blocking rules.
//!
//! Usage:
//!   filegate scan [PATH]          Scan a directory and summarize blocked files
//!   filegate scan --format json   Print the full scan result as JSON
//!   filegate --help               Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use filegate_core::{BlockReason, ScanConfig, ScanResult};
use filegate_scan::Scanner;

#[derive(Parser)]
#[command(
    name = "filegate",
    version,
    about = "Concurrent file scanner that flags files against blocking rules",
    long_about = "filegate walks a directory tree, sniffs every file's content type and \
                  blocks files that are too large, have a disallowed extension or match \
                  a blocked pattern."
)]
struct Cli {
    /// Log debug events to stderr
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and report blocked files
    Scan(ScanArgs),
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Path to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Load settings from a TOML file; flags override file values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Largest allowed file size in MiB
    #[arg(long)]
    max_size_mb: Option<u64>,

    /// Only scan the top-level directory
    #[arg(long)]
    no_recursive: bool,

    /// Allowed extension (repeatable); all others are blocked
    #[arg(long = "allow", value_name = "EXT")]
    allowed: Vec<String>,

    /// Blocked file name pattern (repeatable), e.g. "*.tmp"
    #[arg(long = "block", value_name = "GLOB")]
    blocked: Vec<String>,

    /// Number of classification workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Capacity of the work and result queues
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Cap on directories listed concurrently
    #[arg(long)]
    max_traversal_tasks: Option<usize>,

    /// Write blocked_files.json into the scanned directory
    #[arg(long)]
    export: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Print progress to stderr while scanning
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan(args) => run_scan(args).await?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "filegate={level},filegate_scan={level},filegate_export={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the scan config from the optional file and the flag overrides.
fn build_config(args: &ScanArgs) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };

    if let Some(mb) = args.max_size_mb {
        config.max_file_size_mb = mb;
    }
    if args.no_recursive {
        config.recursive = false;
    }
    if !args.allowed.is_empty() {
        config.allowed_extensions = args.allowed.clone();
    }
    if !args.blocked.is_empty() {
        config.blocked_patterns = args.blocked.clone();
    }
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if let Some(capacity) = args.queue_capacity {
        config.queue_capacity = capacity;
        config.result_queue_capacity = capacity;
    }
    if args.max_traversal_tasks.is_some() {
        config.max_traversal_tasks = args.max_traversal_tasks;
    }
    if args.export {
        config.export_on_completion = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run a scan and print the result.
async fn run_scan(args: ScanArgs) -> Result<()> {
    let config = build_config(&args)?;
    tracing::debug!(?config, "resolved configuration");
    let scanner = Arc::new(Scanner::new(config));

    if matches!(args.format, OutputFormat::Text) {
        eprintln!("Scanning {}...", args.path.display());
    }

    let reporter = args.progress.then(|| {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                let p = scanner.progress();
                eprintln!(
                    "  {} / {} files, {} blocked, {} errors, {:.0} files/s",
                    p.scanned_files,
                    p.total_files,
                    p.blocked_files,
                    p.errors.len(),
                    p.files_per_second()
                );
            }
        })
    });

    let outcome = scanner.scan(&args.path).await;
    if let Some(reporter) = reporter {
        reporter.abort();
    }
    let result = outcome.context("Scan failed")?;

    match args.format {
        OutputFormat::Text => print_summary(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

fn print_summary(result: &ScanResult) {
    let progress = &result.progress;

    println!();
    println!("{}", "─".repeat(60));
    println!(" {}", result.root.display());
    println!(
        " {} entries ({} directories), {}",
        result.files.len(),
        result.directory_count(),
        format_size(progress.total_size)
    );
    println!(
        " {} blocked, {}",
        progress.blocked_files,
        format_size(result.blocked_size())
    );
    println!(" Scanned in {:.2}s", result.duration.as_secs_f64());
    println!("{}", "─".repeat(60));

    let groups = result
        .blocked()
        .into_group_map_by(|f| f.block_reason.clone().unwrap_or(BlockReason::Unknown));

    for (reason, files) in groups
        .into_iter()
        .sorted_by_cached_key(|(reason, _)| reason.to_string())
    {
        println!();
        println!("{} ({}):", reason, files.len());
        for file in files.iter().sorted_by(|a, b| a.path.cmp(&b.path)) {
            println!(
                "  {:>10}  {}",
                format_size(file.size),
                relative(&file.path, &result.root).display()
            );
        }
    }

    if !progress.errors.is_empty() {
        println!();
        println!("{} error(s) during scan:", progress.errors.len());
        for error in &progress.errors {
            println!("  {error}");
        }
    }

    if let Some(error) = &result.error {
        println!();
        println!("{error}");
    }
}

fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path,
    }
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
