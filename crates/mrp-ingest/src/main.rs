//! MRP ingestion CLI - Main entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mrp_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use mrp_ingest::completeness::CompletenessTracker;
use mrp_ingest::config::IngestConfig;
use mrp_ingest::models::Source;
use mrp_ingest::orchestrator::{JobMode, JobOrchestrator};
use mrp_ingest::scraper::SolScraper;
use mrp_ingest::store::{CompletenessStore, JobStore, MemoryStore, PgStore, PhotoStore};

#[derive(Parser)]
#[command(name = "mrp-ingest", version, about = "Mars rover photo metadata ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run against an in-memory store instead of Postgres
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose console logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a single sol of one source
    Sol {
        source: Source,
        sol: u32,
    },

    /// Ingest an inclusive sol range of one source
    Range {
        source: Source,
        start: u32,
        end: u32,
        /// Delay between sols in milliseconds, overriding the configured value
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Ingest every source from the configured start sol to its current sol
    Full {
        /// Required; a full scrape takes days against the live feeds
        #[arg(long)]
        confirm: bool,
    },

    /// Show the completeness ledger summary for a source
    Status { source: Source },

    /// Reconcile the completeness ledger against stored photo counts
    Backfill { source: Source },

    /// Show the current sol reported by a source's feed
    CurrentSol { source: Source },

    /// Show a persisted job run
    Job { id: Uuid },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env().unwrap_or_else(|_| {
        LogConfig::builder()
            .level(if cli.verbose {
                LogLevel::Debug
            } else {
                LogLevel::Info
            })
            .output(LogOutput::Console)
            .log_file_prefix("mrp-ingest".to_string())
            .build()
    });
    let _ = init_logging(&log_config);

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Store handles behind the three storage traits
struct Stores {
    photos: Arc<dyn PhotoStore>,
    completeness: Arc<dyn CompletenessStore>,
    jobs: Arc<dyn JobStore>,
}

async fn connect_stores(dry_run: bool) -> Result<Stores> {
    if dry_run {
        let store = Arc::new(MemoryStore::new());
        return Ok(Stores {
            photos: store.clone(),
            completeness: store.clone(),
            jobs: store,
        });
    }

    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .context("Failed to connect to Postgres")?;

    let store = PgStore::new(pool);
    store.migrate().await.context("Migration failed")?;

    let store = Arc::new(store);
    Ok(Stores {
        photos: store.clone(),
        completeness: store.clone(),
        jobs: store,
    })
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = IngestConfig::load()?;
    if let Commands::Range {
        delay_ms: Some(delay_ms),
        ..
    } = cli.command
    {
        config.inter_sol_delay_ms = delay_ms;
    }
    let config = Arc::new(config);
    let stores = connect_stores(cli.dry_run).await?;

    let scraper = Arc::new(SolScraper::new(
        config.clone(),
        stores.photos.clone(),
        stores.completeness.clone(),
    )?);

    match cli.command {
        Commands::Sol { source, sol } => {
            run_job(&config, &stores, scraper, JobMode::Sol { source, sol }).await
        }

        Commands::Range {
            source, start, end, ..
        } => {
            anyhow::ensure!(start <= end, "start sol must not exceed end sol");
            run_job(&config, &stores, scraper, JobMode::Range { source, start, end }).await
        }

        Commands::Full { confirm } => {
            anyhow::ensure!(
                confirm,
                "a full scrape takes days; re-run with --confirm to proceed"
            );
            run_job(&config, &stores, scraper, JobMode::Full).await
        }

        Commands::Status { source } => {
            let tracker = CompletenessTracker::new(stores.completeness.clone());
            let summary = tracker.summarize(source).await?;

            println!("Completeness for {}:", source);
            println!("  sols tracked:  {}", summary.total_sols());
            println!("  success:       {}", summary.success);
            println!("  empty:         {}", summary.empty);
            println!("  partial:       {}", summary.partial);
            println!("  failed:        {}", summary.failed);
            println!("  pending:       {}", summary.pending);
            println!("  total photos:  {}", summary.total_photos);
            if let Some(at) = summary.last_attempt_at {
                println!("  last attempt:  {}", at.to_rfc3339());
            }
            Ok(())
        }

        Commands::Backfill { source } => {
            let tracker = CompletenessTracker::new(stores.completeness.clone());
            let written = tracker.backfill(source, stores.photos.as_ref()).await?;
            println!("Backfilled {} ledger records for {}", written, source);
            Ok(())
        }

        Commands::CurrentSol { source } => {
            let sol = scraper.latest_sol(source).await?;
            println!("{} is on sol {}", source, sol);
            Ok(())
        }

        Commands::Job { id } => {
            let run = stores
                .jobs
                .get_run(id)
                .await?
                .ok_or_else(|| mrp_common::MrpError::JobNotFound(id.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(())
        }
    }
}

async fn run_job(
    config: &Arc<IngestConfig>,
    stores: &Stores,
    scraper: Arc<SolScraper>,
    mode: JobMode,
) -> Result<()> {
    let orchestrator = JobOrchestrator::new(
        config.clone(),
        scraper.clone(),
        scraper,
        stores.photos.clone(),
        stores.jobs.clone(),
    );

    // Ctrl-C requests cooperative cancellation at the next sol boundary
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current sol...");
            signal_token.cancel();
        }
    });

    let run = orchestrator.run(mode, cancel).await?;

    println!("Job {} finished: {}", run.id, run.status);
    println!(
        "  sols: {} attempted, {} succeeded, {} failed",
        run.sols_attempted, run.sols_succeeded, run.sols_failed
    );
    println!("  photos added: {}", run.photos_added);
    for detail in &run.sources {
        println!(
            "  {}: {} ({} sols, {} photos{})",
            detail.source,
            detail.status,
            detail.sols_attempted,
            detail.photos_added,
            if detail.failed_sols.is_empty() {
                String::new()
            } else {
                format!(", failed sols {:?}", detail.failed_sols)
            }
        );
    }
    Ok(())
}
