//! Reel-Harvest main entry point
//!
//! This is the command-line interface for the Reel-Harvest title harvester.

use clap::Parser;
use reel_harvest::config::{load_config_with_hash, Config};
use reel_harvest::storage::RunStatus;
use reel_harvest::{Coordinator, Task};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Reel-Harvest: a resumable movie-title harvester
///
/// Reel-Harvest walks listing, parental-guide and title pages, appends one
/// record per title to a SQLite store and stops at the configured item quota.
/// Interrupted runs resume from the persisted queue.
#[derive(Parser, Debug)]
#[command(name = "reel-harvest")]
#[command(version)]
#[command(about = "A resumable movie-title harvester", long_about = None)]
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

    /// Discard the persisted queue before starting (stored records are kept)
    #[arg(long)]
    fresh: bool,

    /// Validate config and show how the start URLs would be seeded
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Write stored records as JSON lines to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export {
        handle_export(&config, path)?;
    } else {
        handle_harvest(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reel_harvest=info,warn"),
            1 => EnvFilter::new("reel_harvest=debug,info"),
            2 => EnvFilter::new("reel_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the seed plan
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Reel-Harvest Dry Run ===\n");

    println!("Run Configuration:");
    match config.run.max_items {
        Some(max) => println!("  Max items: {}", max),
        None => println!("  Max items: unlimited"),
    }
    println!(
        "  Max concurrent pages: {}",
        config.run.max_concurrent_pages_open
    );
    println!(
        "  Request retries: {} ({}ms apart)",
        config.run.max_request_retries, config.run.retry_delay_ms
    );
    println!("  Prioritize details: {}", config.run.prioritize_details);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    if let Some(proxy) = &config.proxy {
        println!("  Proxy: {}", proxy.url);
    }

    let fields = config
        .extension
        .as_ref()
        .map(|ext| ext.fields.as_slice())
        .unwrap_or_default();
    println!("\nExtension Fields ({}):", fields.len());
    for field in fields {
        let source = field.attribute.as_deref().unwrap_or("text");
        let required = if field.required { ", required" } else { "" };
        println!("  - {} <- {} [{}{}]", field.name, field.selector, source, required);
    }

    println!("\nStart URLs ({}):", config.run.start_urls.len());
    for start in &config.run.start_urls {
        let (task, priority) = Task::seed(Url::parse(&start.url)?)?;
        println!(
            "  - {} -> {} {} ({})",
            start.url,
            task.stage(),
            task.url(),
            priority.to_db_string()
        );
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use reel_harvest::output::{generate_summary, load_statistics, print_statistics};
    use reel_harvest::storage::SqliteStorage;

    println!("Database: {}\n", config.output.database_path);

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    if let Ok(summary) = generate_summary(&storage) {
        println!(
            "Latest run: #{} ({}), started {}",
            summary.run_id, summary.status, summary.started_at
        );
        if let Some(seconds) = summary.duration_seconds {
            println!("Duration: {}s", seconds);
        }
        println!();
    }

    // Load statistics
    let stats = load_statistics(&storage)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes records as JSON lines
fn handle_export(config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    use reel_harvest::output::export_jsonl;
    use reel_harvest::storage::SqliteStorage;

    println!("=== Exporting Records ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", path.display());
    println!();

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    tracing::info!("Loading records from database...");
    let written = export_jsonl(&storage, path, false)?;

    println!("✓ {} records exported to: {}", written, path.display());

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh harvest (persisted queue discarded)");
    } else {
        tracing::info!("Starting harvest (will resume the persisted queue)");
    }

    tracing::info!(
        "Start URLs: {}, max items: {}",
        config.run.start_urls.len(),
        config
            .run
            .max_items
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unlimited".to_string())
    );

    let coordinator = Coordinator::new(config, config_hash, fresh)?;

    // Ctrl-C stops dispatch; pending work is kept for the next run
    let handle = coordinator.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after in-flight fetches");
            handle.abort();
        }
    });

    match coordinator.run().await {
        Ok(report) => {
            match report.status {
                RunStatus::Completed => tracing::info!("Harvest completed: queue drained"),
                _ => tracing::info!("Harvest stopped: {}", report.status.to_db_string()),
            }
            tracing::info!(
                "{} records stored, {} failures this run, {} tasks left pending",
                report.total_records,
                report.failures,
                report.released
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
