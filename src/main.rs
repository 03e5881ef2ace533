//! CLI entry point for `scanbench`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use http::StatusCode;
use indicatif::{ProgressBar, ProgressStyle};

use scanbench::config::Config;
use scanbench::corpus::loader::{self, Corpus};
use scanbench::corpus::ring::MessagesRing;
use scanbench::corpus::stats::CorpusStats;
use scanbench::driver::{self, RunOptions, RunSummary};
use scanbench::metrics::Metrics;
use scanbench::parser::mail::FilePolicy;

/// Replay a corpus of email messages against a content-scanning service.
#[derive(Parser)]
#[command(name = "scanbench", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the corpus and print its statistics
    Stats {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Send the corpus to a scan endpoint
    Run {
        /// Scan endpoint, e.g. http://scanner:8080/api/v1/scan
        #[arg(value_name = "URI")]
        uri: Option<String>,
        #[command(flatten)]
        corpus: CorpusArgs,
        #[command(flatten)]
        load: LoadArgs,
        /// Write the Prometheus metrics of the run to this file
        #[arg(long, value_name = "FILE")]
        metrics_out: Option<PathBuf>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args)]
struct CorpusArgs {
    /// Directory of .eml, .msg and .mail files (searched recursively)
    #[arg(short, long, value_name = "DIR")]
    directory: Option<PathBuf>,
    /// Largest accepted file in KB (1 KB = 1000 bytes)
    #[arg(long, value_name = "KB")]
    max_size: Option<u64>,
    /// Smallest accepted file in KB
    #[arg(long, value_name = "KB")]
    min_size: Option<u64>,
    /// Drop files with unreadable headers instead of sending them headerless
    #[arg(long)]
    send_headers: bool,
}

#[derive(Args)]
struct LoadArgs {
    /// Number of concurrent workers
    #[arg(short, long)]
    concurrency: Option<usize>,
    /// How long to send, e.g. 30s or 5m
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,
    /// Per-request timeout, e.g. 5s
    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
    /// Requests per second cap (0 = unlimited)
    #[arg(short, long)]
    qps: Option<u32>,
    /// Status code counted as success
    #[arg(long)]
    success_status: Option<u16>,
    /// Disable keep-alive
    #[arg(short = 'k', long)]
    disable_keep_alive: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; problems are reported once logging is up
    let (config, config_error) = scanbench::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Ignoring config file, using defaults");
    }

    let result = match cli.command {
        Commands::Stats { corpus, json } => cmd_stats(&corpus, json, &config),
        Commands::Run {
            uri,
            corpus,
            load,
            metrics_out,
            json,
        } => cmd_run(
            uri.as_deref(),
            &corpus,
            &load,
            metrics_out.as_deref(),
            json,
            &config,
        ),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %format!("{e:#}"), "Fatal");
    }
    result
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = scanbench::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "scanbench.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "scanbench", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Load the corpus with a spinner, merging CLI flags over the config file.
fn load_corpus(uri: &str, args: &CorpusArgs, config: &Config) -> anyhow::Result<Corpus> {
    let directory = args
        .directory
        .clone()
        .or_else(|| config.corpus.directory.clone())
        .context("no corpus directory given (use --directory or [corpus] directory)")?;
    let policy = FilePolicy::from_kb(
        args.min_size.unwrap_or(config.corpus.min_file_size_kb),
        args.max_size.unwrap_or(config.corpus.max_file_size_kb),
        args.send_headers || config.corpus.send_headers,
    )?;
    let uri = loader::parse_uri(uri)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Loading corpus: {pos} message(s) accepted")?,
    );

    let report = |accepted: usize| pb.set_position(accepted as u64);
    let corpus = loader::load_corpus(&uri, &directory, &policy, Some(&report))?;

    pb.finish_and_clear();
    Ok(corpus)
}

/// Show statistics for a corpus directory.
fn cmd_stats(args: &CorpusArgs, json: bool, config: &Config) -> anyhow::Result<()> {
    let start = Instant::now();
    // Stats never send anything; any valid URI will do.
    let corpus = load_corpus("http://localhost/", args, config)?;
    let elapsed = start.elapsed();

    if json {
        print_stats_json(&corpus.root, &corpus.stats, elapsed)?;
    } else {
        print_stats_table(&corpus.root, &corpus.stats, elapsed);
    }

    if corpus.stats.count == 0 {
        anyhow::bail!(scanbench::error::ScanbenchError::EmptyCorpus(corpus.root));
    }
    Ok(())
}

/// Send the corpus to the scan endpoint and print a summary.
fn cmd_run(
    uri: Option<&str>,
    corpus_args: &CorpusArgs,
    load: &LoadArgs,
    metrics_out: Option<&Path>,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let uri = uri
        .map(str::to_string)
        .or_else(|| config.load.uri.clone())
        .context("no scan endpoint given (pass URI or set [load] uri)")?;

    let success_status = load.success_status.unwrap_or(config.load.success_status);
    let options = RunOptions {
        concurrency: load.concurrency.unwrap_or(config.load.concurrency),
        duration: load.duration.unwrap_or(config.load.duration),
        timeout: load.timeout.unwrap_or(config.load.timeout),
        qps: load.qps.unwrap_or(config.load.qps),
        success_status: StatusCode::from_u16(success_status)
            .with_context(|| format!("invalid success status {success_status}"))?,
        disable_keep_alive: load.disable_keep_alive || config.load.disable_keep_alive,
    };
    if options.concurrency == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }

    let corpus = load_corpus(&uri, corpus_args, config)?;
    print_stats_table(&corpus.root, &corpus.stats, Duration::ZERO);
    let ring = Arc::new(MessagesRing::from_corpus(corpus)?);
    let metrics = Metrics::new()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
        .with_message("Sending:");
    bar.enable_steady_tick(Duration::from_millis(100));

    let summary = runtime.block_on(driver::run(Arc::clone(&ring), metrics.clone(), &options))?;
    bar.finish_and_clear();

    if json {
        print_summary_json(&summary, &options)?;
    } else {
        print_summary_table(&summary, &options);
    }

    if let Some(path) = metrics_out {
        std::fs::write(path, metrics.encode()?)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        println!("  Metrics written to {}", path.display());
    }

    Ok(())
}

/// Print corpus statistics in a human-readable table.
fn print_stats_table(source: &Path, stats: &CorpusStats, elapsed: Duration) {
    use humansize::{format_size, DECIMAL};

    println!();
    println!("  {:<22} {}", "Corpus", source.display());
    println!("  {:<22} {}", "Messages", stats.count);
    println!("  {:<22} {}", "  with headers", stats.headered);
    println!("  {:<22} {}", "  headerless", stats.headerless);
    if let Some(avg) = stats.avg_size() {
        println!("  {:<22} {}", "Average size", format_size(avg as u64, DECIMAL));
    }
    if let (Some(min), Some(max)) = (stats.min_size, stats.max_size) {
        println!(
            "  {:<22} {} to {}",
            "Size range",
            format_size(min, DECIMAL),
            format_size(max, DECIMAL)
        );
    }
    println!("  {:<22} {}", "Total size", format_size(stats.total_bytes, DECIMAL));
    println!("  {:<22} {}", "Skipped (size)", stats.skipped_size);
    println!("  {:<22} {}", "Skipped (unparsable)", stats.skipped_unparsable);
    if !elapsed.is_zero() {
        println!("  {:<22} {:.2?}", "Load time", elapsed);
    }
    println!();
}

/// Print corpus statistics as JSON.
fn print_stats_json(source: &Path, stats: &CorpusStats, elapsed: Duration) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "directory": source.to_string_lossy(),
        "stats": stats,
        "avg_size": stats.avg_size(),
        "load_time_ms": elapsed.as_millis(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print the outcome of a run in a human-readable table.
fn print_summary_table(summary: &RunSummary, options: &RunOptions) {
    use humansize::{format_size, DECIMAL};

    let fmt_latency =
        |d: Option<Duration>| d.map_or_else(|| "-".to_string(), |d| format!("{d:.2?}"));

    println!();
    println!("  {:<22} {}", "Concurrency", options.concurrency);
    if options.qps > 0 {
        println!("  {:<22} {}", "QPS cap", options.qps);
    }
    println!("  {:<22} {:.2?}", "Elapsed", summary.elapsed);
    println!("  {:<22} {}", "Requests", summary.requests);
    println!(
        "  {:<22} {}",
        format!("Status {}", options.success_status.as_u16()),
        summary.successes
    );
    println!("  {:<22} {}", "Other status", summary.failures);
    println!("  {:<22} {}", "Errors", summary.errors);
    println!("  {:<22} {:.2}", "Requests/s", summary.rate());
    println!("  {:<22} {}", "Bytes sent", format_size(summary.bytes_sent, DECIMAL));
    println!(
        "  {:<22} avg {}; p50 {}; p90 {}; p99 {}",
        "Latency",
        fmt_latency(summary.latency_avg()),
        fmt_latency(summary.latency_quantile(0.5)),
        fmt_latency(summary.latency_quantile(0.9)),
        fmt_latency(summary.latency_quantile(0.99)),
    );
    println!();
}

/// Print the outcome of a run as JSON.
fn print_summary_json(summary: &RunSummary, options: &RunOptions) -> anyhow::Result<()> {
    let millis = |d: Option<Duration>| d.map(|d| d.as_secs_f64() * 1000.0);
    let output = serde_json::json!({
        "concurrency": options.concurrency,
        "elapsed_ms": summary.elapsed.as_millis(),
        "requests": summary.requests,
        "successes": summary.successes,
        "failures": summary.failures,
        "errors": summary.errors,
        "requests_per_second": summary.rate(),
        "bytes_sent": summary.bytes_sent,
        "latency_ms": {
            "avg": millis(summary.latency_avg()),
            "p50": millis(summary.latency_quantile(0.5)),
            "p90": millis(summary.latency_quantile(0.9)),
            "p99": millis(summary.latency_quantile(0.99)),
        },
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
