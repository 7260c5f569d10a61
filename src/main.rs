//! Kolesa-Harvest main entry point
//!
//! This is the command-line interface for the Kolesa-Harvest advert crawler.

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;
use kolesa_harvest::config::{load_config_with_hash, Config};
use kolesa_harvest::crawler::crawl;
use kolesa_harvest::frontier::listing_urls;
use kolesa_harvest::output::{plan_output, print_report, OutputPlan};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Kolesa-Harvest: a resumable classifieds crawler
///
/// Kolesa-Harvest walks the listing pages of the configured categories,
/// fetches every advert and appends one CSV row per advert as soon as it
/// arrives. With --update, adverts already in the file are skipped.
#[derive(Parser, Debug)]
#[command(name = "kolesa-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable classifieds crawler", long_about = None)]
struct Cli {
    /// CSV file to write records to
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE", default_value = "harvest.toml")]
    config: PathBuf,

    /// Continue an existing output file, fetching only adverts not in it yet
    #[arg(long)]
    update: bool,

    /// Fetch at most this many listing pages per category
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pages: Option<u32>,

    /// Answer yes to the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(pages) = cli.pages {
        config.crawler.max_listing_pages = Some(pages);
    }

    let plan = plan_output(&cli.output, cli.update, Local::now().naive_local());
    if let Some(notice) = &plan.notice {
        tracing::warn!("{}", notice);
    }

    if cli.dry_run {
        return handle_dry_run(&config, &plan);
    }

    if let Some(prompt) = &plan.prompt {
        if !cli.yes && !confirm(prompt)? {
            println!("Nothing written.");
            return Ok(());
        }
    }

    handle_crawl(config, plan).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kolesa_harvest=info,warn"),
            1 => EnvFilter::new("kolesa_harvest=debug,info"),
            2 => EnvFilter::new("kolesa_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Asks a yes/no question on stdin; anything but y/yes declines
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;

    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "д" | "да"
    ))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, plan: &OutputPlan) -> anyhow::Result<()> {
    println!("=== Kolesa-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Cool-down: {}s", config.crawler.cooldown_secs);
    println!("  Max retries: {}", config.crawler.max_retries);
    if let Some(pages) = config.crawler.max_listing_pages {
        println!("  Listing pages per category: at most {}", pages);
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.value);
    for (name, value) in &config.headers {
        println!("  {}: {}", name, value);
    }

    println!("\nOutput:");
    println!("  File: {}", plan.path.display());
    println!("  Mode: {}", plan.mode);
    println!("  Columns: {}", config.output.columns);
    println!("  Encoding: {}", config.output.encoding);

    let listings = listing_urls(
        &config.site,
        &config.categories,
        config.crawler.max_listing_pages,
    )
    .context("Failed to build listing URLs")?;

    println!("\nCategories ({}):", config.categories.len());
    for category in &config.categories {
        println!("  - {} ({} adverts)", category.id, category.item_count);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start with {} listing pages", listings.len());

    Ok(())
}

/// Handles the main harvest operation
async fn handle_crawl(config: Config, plan: OutputPlan) -> anyhow::Result<()> {
    tracing::info!(
        "Starting {} harvest into {}",
        plan.mode,
        plan.path.display()
    );

    let report = tokio::select! {
        result = crawl(config, &plan.path, plan.mode) => {
            result.with_context(|| format!("Harvest into {} failed", plan.path.display()))?
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::warn!(
                "Interrupted; {} holds every record saved so far, rerun with --update to continue",
                plan.path.display()
            );
            bail!("harvest interrupted");
        }
    };

    print_report(&report);
    Ok(())
}
