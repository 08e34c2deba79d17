//! Toc-Ripple main entry point
//!
//! This is the command-line interface for resolving tables of contents and
//! checking links through the throttled fetch pipeline.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use toc_ripple::config::{load_config_with_hash, Config};
use toc_ripple::{Dispatcher, FetchPipeline, HookRegistry, QueueRegistry, ResolveError, ResolveHints};
use tracing_subscriber::EnvFilter;

/// Toc-Ripple: a polite table-of-contents fetcher
///
/// Every request goes through a per-host queue that spaces requests with a
/// randomized delay, so a batch of URLs never hammers a single site.
#[derive(Parser, Debug)]
#[command(name = "toc-ripple")]
#[command(version)]
#[command(about = "A polite table-of-contents fetcher", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Validate config and show the registered hooks without fetching anything
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the tables of contents published at each URL and print them as JSON
    Resolve {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Medium the URLs are expected to describe
        #[arg(long)]
        medium_id: Option<u64>,

        /// When these URLs were last scraped (RFC 3339)
        #[arg(long, value_parser = parse_timestamp)]
        last_request: Option<DateTime<Utc>>,
    },

    /// Check whether each link still resolves
    Check {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    match cli.command {
        Some(Command::Resolve {
            urls,
            medium_id,
            last_request,
        }) => {
            let hints = ResolveHints {
                target_medium_id: medium_id,
                last_request,
            };
            handle_resolve(&config, urls, hints).await
        }
        Some(Command::Check { urls }) => handle_check(&config, urls).await,
        None => bail!("Nothing to do: pass a subcommand or --dry-run (see --help)"),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("toc_ripple=info,warn"),
            1 => EnvFilter::new("toc_ripple=debug,info"),
            2 => EnvFilter::new("toc_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries JSON results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn build_pipeline(config: &Config) -> anyhow::Result<FetchPipeline> {
    let registry = Arc::new(QueueRegistry::from_config(&config.queue));
    FetchPipeline::from_config(config, registry).context("Failed to build HTTP clients")
}

/// Handles the --dry-run mode: shows configuration and registered hooks
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let hooks = HookRegistry::from_config(config)?;

    println!("=== Toc-Ripple Dry Run ===\n");

    println!("Queues:");
    println!("  Default interval: {}ms", config.queue.default_interval);
    println!("  Fast interval: {}ms", config.queue.fast_interval);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!(
        "  Challenge signatures: {}",
        config.http.challenge_signatures.join(", ")
    );
    println!(
        "  Challenge retries: {} attempts, {}ms apart",
        config.http.challenge_attempts, config.http.challenge_retry_delay
    );

    println!("\nSame-day zone: {}", config.normalize.time_zone);

    println!("\nHooks ({}):", hooks.len());
    for (name, pattern) in hooks.entries() {
        println!("  - {} ({})", name, pattern);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles `resolve`: prints one JSON line per URL
async fn handle_resolve(config: &Config, urls: Vec<String>, hints: ResolveHints) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let dispatcher = Dispatcher::from_config(config, pipeline)?;

    let results = join_all(urls.iter().map(|url| dispatcher.resolve_toc(url, &hints))).await;

    let mut failed = 0;
    for (url, result) in urls.iter().zip(results) {
        let line = match result {
            Ok(resolved) => json!({ "url": url, "tocs": resolved.entries }),
            Err(e) => {
                failed += 1;
                tracing::error!(url = %url, kind = error_kind(&e), retryable = e.is_retryable(), "{}", e);
                json!({
                    "url": url,
                    "error": {
                        "kind": error_kind(&e),
                        "message": e.to_string(),
                        "retryable": e.is_retryable(),
                    }
                })
            }
        };
        println!("{}", line);
    }

    if failed > 0 {
        bail!("{} of {} URLs could not be resolved", failed, urls.len());
    }
    Ok(())
}

fn error_kind(error: &ResolveError) -> &'static str {
    match error {
        ResolveError::Url(_) => "url",
        ResolveError::MissingResource(_) => "missing-resource",
        ResolveError::Fetch(_) => "fetch",
    }
}

/// Handles `check`: probes every link on the fast partition
async fn handle_check(config: &Config, urls: Vec<String>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;

    let results = join_all(urls.iter().map(|url| pipeline.probe_link(url))).await;

    let mut unavailable = 0;
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(status) if status.available => println!("✓ {} ({})", url, status.status),
            Ok(status) => {
                unavailable += 1;
                println!("✗ {} ({})", url, status.status);
            }
            Err(e) => {
                unavailable += 1;
                println!("✗ {} ({})", url, e);
            }
        }
    }

    if unavailable > 0 {
        bail!("{} of {} links are unavailable", unavailable, urls.len());
    }
    Ok(())
}
