//! jobdex CLI — wires configuration, the database and the two ingestion
//! pipelines together.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use jobdex::config::{load_config, Config};
use jobdex::db::{self, Database};
use jobdex::error::{ConfigError, JobdexError};
use jobdex::{crawler, extractor};

#[derive(Parser)]
#[command(name = "jobdex", version, about = "Job share crawler and material-usage extractor")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "jobdex.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the configured shares and index new or changed assets.
    Crawl,
    /// Extract material-usage data from registered spreadsheets.
    Extract,
    /// Run the crawler, then the extractor.
    Run,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), JobdexError> {
    let config = load_config(&cli.config)?;
    let db = open_database(&config)?;

    match cli.command {
        Command::Crawl => crawl(&db, &config)?,
        Command::Extract => extract(&db, &config)?,
        Command::Run => {
            crawl(&db, &config)?;
            extract(&db, &config)?;
        }
    }

    Ok(())
}

fn crawl(db: &Database, config: &Config) -> Result<(), JobdexError> {
    let summary = crawler::run(db, config)?;
    info!(
        "Crawl finished: {} discovered, {} written in {} batch(es)",
        summary.discovered, summary.written, summary.batches
    );
    Ok(())
}

fn extract(db: &Database, config: &Config) -> Result<(), JobdexError> {
    let summary = extractor::run(db, config.etl_version)?;
    info!(
        "Extraction finished: {} processed, {} skipped, {} failed",
        summary.processed, summary.skipped, summary.failed
    );
    Ok(())
}

fn open_database(config: &Config) -> Result<Database, JobdexError> {
    let path = match &config.database_path {
        Some(path) => PathBuf::from(path),
        None => db::default_database_path().ok_or_else(|| {
            JobdexError::Config(ConfigError::Validation {
                message: "No database_path configured and no home directory found".to_string(),
            })
        })?,
    };
    Ok(Database::open(&path)?)
}

fn init_tracing() {
    // Route `log` macro output through tracing as well.
    let _ = tracing_log::LogTracer::init();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
