//! Slotscout main entry point
//!
//! This is the command-line interface for the Slotscout availability harvester.

use anyhow::{bail, Context};
use clap::Parser;
use slotscout::config::{load_config_with_hash, Config, SinkConfig};
use slotscout::crawler::{run_crawl, target_date_in, Endpoints};
use slotscout::output::{print_report, RunReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Slotscout: a facility reservation availability harvester
///
/// Slotscout signs in to a reservation platform, walks its facility listing,
/// fetches tomorrow's availability for every facility, and upserts one record
/// per facility into a table store.
#[derive(Parser, Debug)]
#[command(name = "slotscout")]
#[command(version = "1.0.0")]
#[command(about = "A facility reservation availability harvester", long_about = None)]
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

    /// Validate config and show what would be harvested without any network access
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the local record table and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Credentials and API keys may live in a local .env file
    dotenvy::dotenv().ok();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)?;
        Ok(ExitCode::SUCCESS)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_crawl(config, config_hash, cli.json).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so `--json` output on stdout stays machine-readable.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("slotscout=info,warn"),
            1 => EnvFilter::new("slotscout=debug,info"),
            2 => EnvFilter::new("slotscout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let endpoints = Endpoints::from_config(&config.platform)?;
    let target_date = target_date_in(config.crawler.timezone, chrono::Utc::now());

    println!("=== Slotscout Dry Run ===\n");

    println!("Platform:");
    println!("  Base URL: {}", config.platform.base_url);
    println!("  Site: {}", config.platform.site);
    println!("  Locale: {}", config.platform.locale);
    println!("  Landing page: {}", endpoints.landing());
    println!("  Listing endpoint: {}", endpoints.listing());

    println!("\nCredentials:");
    println!("  Login name from: ${}", config.credentials.login_name_env);
    println!("  Password from: ${}", config.credentials.password_env);

    println!("\nListing:");
    println!("  Facility types: {:?}", config.listing.facility_type_ids);
    println!(
        "  Order: {} {}",
        config.listing.order_by_field, config.listing.order_direction
    );
    println!("  Page size: {}", config.listing.page_size);

    println!("\nCrawler:");
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Timezone: {}", config.crawler.timezone);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nRetry:");
    println!(
        "  Fetch: {} attempt(s), {}ms initial delay, x{} backoff",
        config.retry.fetch.max_attempts,
        config.retry.fetch.delay_ms,
        config.retry.fetch.backoff_multiplier
    );
    println!(
        "  Persistence: {} attempt(s), {}ms initial delay, x{} backoff",
        config.retry.persistence.max_attempts,
        config.retry.persistence.delay_ms,
        config.retry.persistence.backoff_multiplier
    );

    println!("\nSink:");
    match &config.sink {
        SinkConfig::Postgrest {
            url,
            table,
            api_key_env,
        } => {
            println!("  PostgREST: {} (table {})", url, table);
            println!("  API key from: ${}", api_key_env);
        }
        SinkConfig::Sqlite {
            database_path,
            table,
        } => {
            println!("  SQLite: {} (table {})", database_path, table);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest availability for {}", target_date);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the local record table
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use slotscout::output::{load_statistics, print_statistics};
    use slotscout::storage::SqliteStore;

    let SinkConfig::Sqlite {
        database_path,
        table,
    } = &config.sink
    else {
        bail!("--stats is only available for a sqlite sink");
    };

    println!("Database: {}\n", database_path);

    let store = SqliteStore::new(Path::new(database_path), table)?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_crawl(config: Config, config_hash: String, json: bool) -> anyhow::Result<ExitCode> {
    tracing::info!(
        "Harvesting site {} ({} facility type(s), page size {})",
        config.platform.site,
        config.listing.facility_type_ids.len(),
        config.listing.page_size
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            ctrl_c.cancel();
        }
    });

    let report = run_crawl(config, config_hash, cancel).await?;
    emit_report(&report, json)?;

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn emit_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print_report(report);
    }
    Ok(())
}
