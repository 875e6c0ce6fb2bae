#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for year-partitioned Retrosheet ingestion.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use retro_archive_cli_utils::IndicatifProgress;
use retro_archive_database::{queries, store};
use retro_archive_ingest::CancellationToken;
use retro_archive_ingest::acquire::HttpAcquirer;
use retro_archive_ingest::config::IngestConfig;
use retro_archive_ingest::orchestrator::{Orchestrator, format_summary};
use retro_archive_ingest::rollback::RollbackManager;
use retro_archive_ingest::selector::{YearSelection, pending_years};
use retro_archive_ingest::signal::install_signal_handlers;
use retro_archive_ingest::transform::ParserTransformer;
use retro_archive_ingest_models::{TableCleanupOutcome, Year};

#[derive(Parser)]
#[command(name = "retro_archive_ingest", about = "Retrosheet event archive ingestion tool")]
struct Cli {
    /// TOML config file (defaults apply for missing keys)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// `DuckDB` store path (overrides config and `RETRO_ARCHIVE_DB`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create schemas and core tables if they do not exist
    Setup,
    /// Ingest every missing year, newest first
    Run {
        /// Newest year to target
        #[arg(long)]
        newest: Option<Year>,
        /// Oldest year to target
        #[arg(long)]
        oldest: Option<Year>,
        /// Comma-separated list of years to target instead of a range
        #[arg(long, value_delimiter = ',')]
        years: Vec<Year>,
        /// Also write the run summary as JSON to this path
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// List the years a run would process, without doing any work
    Pending {
        /// Newest year to target
        #[arg(long)]
        newest: Option<Year>,
        /// Oldest year to target
        #[arg(long)]
        oldest: Option<Year>,
        /// Comma-separated list of years to target instead of a range
        #[arg(long, value_delimiter = ',')]
        years: Vec<Year>,
    },
    /// Show stored event counts per year
    Status,
    /// Remove one year from the store and the source directory
    Rollback {
        /// Year to remove (e.g. 1987)
        year: Year,
    },
}

fn selection(
    config: &mut IngestConfig,
    newest: Option<Year>,
    oldest: Option<Year>,
    years: Vec<Year>,
) -> Result<YearSelection, Box<dyn std::error::Error>> {
    if let Some(newest) = newest {
        config.newest_year = newest;
    }
    if let Some(oldest) = oldest {
        config.oldest_year = oldest;
    }
    config.validate()?;

    if years.is_empty() {
        Ok(YearSelection::Range(config.year_range()?))
    } else {
        Ok(YearSelection::Years(years.into_iter().collect()))
    }
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = retro_archive_cli_utils::init_logger(Some("info"));
    let cli = Cli::parse();

    let mut config = IngestConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Setup => {
            log::info!("Setting up store at {}", config.db_path.display());
            let conn = store::open(&config.db_path)?;
            store::setup_schema(&conn)?;
        }
        Commands::Pending {
            newest,
            oldest,
            years,
        } => {
            let selection = selection(&mut config, newest, oldest, years)?;
            let conn = store::open(&config.db_path)?;
            let pending = pending_years(&conn, &selection);
            if pending.is_empty() {
                println!("Nothing pending.");
            } else {
                println!("{} pending year(s):", pending.len());
                for year in &pending {
                    println!("  {year}");
                }
            }
        }
        Commands::Status => {
            let conn = store::open(&config.db_path)?;
            let counts = queries::year_counts(&conn)?;
            let empty = queries::empty_years(&conn).unwrap_or_default();

            println!("{:<6} EVENTS", "YEAR");
            println!("{}", "-".repeat(20));
            for count in &counts {
                println!("{:<6} {}", count.year, count.events);
            }
            for year in &empty {
                println!("{year:<6} 0 (no records)");
            }
            let total: u64 = counts.iter().map(|c| c.events).sum();
            println!("{}", "-".repeat(20));
            println!("{} year(s), {total} events", counts.len() + empty.len());
        }
        Commands::Rollback { year } => {
            let conn = store::open(&config.db_path)?;
            let report = RollbackManager::from_config(&config).rollback(&conn, year);

            for table in &report.tables {
                let outcome = match &table.outcome {
                    TableCleanupOutcome::Deleted { rows } => format!("deleted {rows} rows"),
                    TableCleanupOutcome::SkippedNoPartitionKey => {
                        "skipped (no partition key)".to_string()
                    }
                    TableCleanupOutcome::Failed { reason } => format!("FAILED: {reason}"),
                };
                println!("{:<40} {outcome}", table.qualified_name());
            }
            for path in &report.removed_paths {
                println!("removed {path}");
            }
            for error in &report.errors {
                println!("error: {error}");
            }
            if !report.is_clean() {
                return Err(format!("rollback of {year} was incomplete").into());
            }
        }
        Commands::Run {
            newest,
            oldest,
            years,
            summary_json,
        } => {
            let selection = selection(&mut config, newest, oldest, years)?;
            let conn = store::open(&config.db_path)?;
            store::setup_schema(&conn)?;

            let pending = pending_years(&conn, &selection);
            if pending.is_empty() {
                println!("All targeted years are already loaded.");
                return Ok(());
            }

            let token = CancellationToken::new();
            let signals = install_signal_handlers(token.clone());

            let acquirer = HttpAcquirer::new(&config)?;
            let transformer = ParserTransformer::new(&config);

            let partitions =
                IndicatifProgress::partitions_bar(&multi, "Years", pending.len() as u64);
            let files = IndicatifProgress::files_bar(&multi, "Loading");

            let summary = Orchestrator::new(&conn, &acquirer, &transformer, &config, token)
                .with_progress(partitions, files.clone())
                .run(pending)
                .await;
            files.finish_and_clear();
            signals.abort();

            let text = format_summary(&summary);
            for line in text.lines() {
                log::info!("{line}");
            }
            print!("{text}");

            if let Some(path) = summary_json {
                std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
                log::info!("Wrote run summary to {}", path.display());
            }
        }
    }

    Ok(())
}
