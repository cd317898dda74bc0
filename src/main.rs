//! Listing-Scraper main entry point
//!
//! This is the command-line interface for the Listing-Scraper classifieds harvester.

use anyhow::Context;
use clap::Parser;
use listing_scraper::config::{load_config_with_hash, ConcurrencyMode, Config, Overrides};
use listing_scraper::crawler::{collect_links, collect_records, watch_interrupts};
use listing_scraper::output::{print_summary, write_records, PriceSummary, WriteOutcome};
use listing_scraper::url::listing_url_for;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Listing-Scraper: a classifieds listing harvester
///
/// Walks a paginated listing, fetches every detail page it links to, extracts the
/// configured fields and writes the qualifying listings to a spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "listing-scraper")]
#[command(version = "1.0.0")]
#[command(about = "A classifieds listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be scraped without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Maximum listing price
    #[arg(long, value_name = "PRICE")]
    max_price: Option<u64>,

    /// Maximum number of listing pages to walk
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Concurrency policy for detail pages
    #[arg(long, value_enum)]
    mode: Option<ConcurrencyMode>,

    /// Worker count or in-flight limit
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Pause after each detail page in sequential mode, in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Retries after the first attempt
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Output path (.xlsx writes a workbook, anything else CSV)
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            max_price: self.max_price,
            max_pages: self.max_pages,
            mode: self.mode,
            concurrency: self.concurrency,
            timeout_ms: self.timeout_ms,
            delay_ms: self.delay_ms,
            retry_ceiling: self.retries,
            output: self.output.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let overrides = cli.overrides();
    let config = if overrides.is_empty() {
        config
    } else {
        overrides
            .apply(config)
            .context("command-line overrides produced an invalid configuration")?
    };

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    handle_scrape(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_scraper=info,warn"),
            1 => EnvFilter::new("listing_scraper=debug,info"),
            2 => EnvFilter::new("listing_scraper=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Listing-Scraper Dry Run ===\n");

    println!("Listing:");
    println!("  First page: {}", listing_url_for(&config.listing, 1)?);
    match config.listing.max_pages {
        Some(max_pages) => println!("  Max pages: {}", max_pages),
        None => println!("  Max pages: unbounded"),
    }
    println!("  Detail links containing: {}", config.listing.link_pattern);

    println!("\nFetch:");
    println!("  Timeout: {}ms", config.fetch.timeout_ms);
    println!("  Retries: {}", config.fetch.retry_ceiling);
    println!("  Rate-limit backoff: {}ms (doubling)", config.fetch.rate_limit_backoff_ms);
    println!("  Transient backoff: {}ms", config.fetch.transient_backoff_ms);
    if config.fetch.accept_invalid_certs {
        println!("  TLS verification: DISABLED");
    }

    println!("\nCollection:");
    println!("  Mode: {:?}", config.collect.mode);
    println!("  Concurrency: {}", config.collect.concurrency);
    println!("  Validity: {:?}", config.validity);

    println!("\nFields ({}):", config.fields.len());
    for field in &config.fields {
        println!(
            "  - {} [{}] ({} rules)",
            field.name,
            field.column_label(),
            field.rules.len()
        );
    }

    println!("\nOutput: {}", config.output.path);
    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main scrape: links, then records, then the output file
async fn handle_scrape(config: Config) -> anyhow::Result<()> {
    let started = Instant::now();
    let cancel = CancellationToken::new();

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, signal_token).await {
            std::process::exit(130);
        }
    });

    let links = collect_links(&config, &cancel).await;
    tracing::info!(
        "Found {} unique listings on {}/{} pages",
        links.links.len(),
        links.pages_visited,
        links.total_pages
    );

    let collection = collect_records(&config, links.links.into_iter().collect(), &cancel).await;

    let rows = match write_records(&collection.records, &config.fields, &config.output)
        .context("failed to write output")?
    {
        WriteOutcome::Empty => {
            println!("Nothing to write");
            0
        }
        WriteOutcome::Written { path, rows } => {
            println!("Saved {} records to {}\n", rows, path.display());
            rows
        }
    };

    let prices = config
        .output
        .price_field
        .as_deref()
        .and_then(|field| PriceSummary::from_records(&collection.records, field));
    print_summary(&collection.stats, started.elapsed(), rows, prices.as_ref());

    Ok(())
}
