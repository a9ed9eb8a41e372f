//! fulcrum-photo-sync: archive photos and report PDFs from completed Fulcrum
//! inspection records into a per-branch, per-project folder tree.
//!
//! Records are listed from the Fulcrum API, new photos are streamed into a
//! staging directory, copied into the archive under caption-derived names,
//! and recorded in a dedup ledger so later passes skip them.

#![warn(clippy::all)]

mod archive;
mod cli;
mod config;
mod fetch;
mod fulcrum;
mod ledger;
mod shutdown;
mod staging;
mod sync;
#[cfg(test)]
mod testing;
mod types;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use archive::{ArchiveWriter, PathResolver};
use cli::Command;
use config::{Config, LedgerConfig, StatusConfig};
use fetch::{FetchConfig, Fetcher};
use fulcrum::{FieldKeys, FormsApi, FulcrumClient};
use ledger::{Ledger, LookupTableLedger, SqliteLedger};
use staging::StagingArea;
use sync::{PassSummary, SyncConfig, SyncEngine};
use types::{LedgerBackend, LogFormat};

/// Open the configured ledger backend.
async fn open_ledger(
    config: &LedgerConfig,
    api: Option<Arc<dyn FormsApi>>,
    keys: &FieldKeys,
) -> anyhow::Result<Arc<dyn Ledger>> {
    let ledger: Arc<dyn Ledger> = match config.backend {
        LedgerBackend::Sqlite => Arc::new(SqliteLedger::open(&config.db_path).await?),
        LedgerBackend::LookupTable => {
            let form_id = config
                .lookup_form_id
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Lookup ledger requires a lookup form id"))?;
            let api = api
                .ok_or_else(|| anyhow::anyhow!("Lookup ledger requires a Fulcrum API token"))?;
            Arc::new(LookupTableLedger::new(api, form_id, keys.clone()))
        }
    };
    tracing::debug!(ledger = %ledger.describe(), "Ledger opened");
    Ok(ledger)
}

/// Failed records do not fail the pass: they are logged and retried on the
/// next run. `fail_on_record_errors` turns them into a non-zero exit.
fn single_pass_result(summary: &PassSummary, fail_on_record_errors: bool) -> anyhow::Result<()> {
    let failed = summary.failed();
    if failed == 0 {
        return Ok(());
    }
    if fail_on_record_errors {
        anyhow::bail!("{} record(s) failed", failed);
    }
    tracing::warn!(failed, "Pass finished with failed records, retrying next run");
    Ok(())
}

/// Run the sync command: one pass, or repeated passes with `--watch-interval`.
async fn run_sync(args: cli::SyncArgs) -> anyhow::Result<()> {
    let config = Config::from_cli(args)?;
    tracing::debug!(?config, "Resolved configuration");
    tracing::info!(
        form_id = %config.form_id,
        archive_root = %config.archive_root.display(),
        concurrency = config.concurrency,
        "Starting fulcrum-photo-sync"
    );

    let api: Arc<dyn FormsApi> = Arc::new(FulcrumClient::new(config.client.clone())?);
    let ledger = open_ledger(&config.ledger, Some(api.clone()), &config.keys).await?;
    let staging = StagingArea::new(config.staging_dir.clone());

    let fetcher = Fetcher::new(
        api.clone(),
        PathResolver::new(config.archive_root.clone(), config.fallback_root.clone()),
        staging.clone(),
        FetchConfig {
            form_id: config.form_id.clone(),
            quality: config.quality,
            concurrency: config.concurrency,
        },
    );
    let engine = SyncEngine::new(
        api,
        ledger,
        fetcher,
        ArchiveWriter::new(config.allow_duplicates),
        staging,
        SyncConfig {
            form_id: config.form_id.clone(),
            keys: config.keys.clone(),
            update_window: config.update_window,
            no_progress_bar: config.no_progress_bar,
        },
    );

    let shutdown_token = shutdown::install_signal_handler()?;

    let Some(interval) = config.watch_interval else {
        let summary = engine.run_pass(&shutdown_token).await?;
        return single_pass_result(&summary, config.fail_on_record_errors);
    };

    loop {
        match engine.run_pass(&shutdown_token).await {
            Ok(summary) if summary.failed() > 0 => {
                tracing::warn!(
                    failed = summary.failed(),
                    "Pass finished with failures, retrying next pass"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %format!("{:#}", e), "Pass failed"),
        }

        if shutdown_token.is_cancelled() {
            tracing::info!("Shutdown requested, exiting...");
            break;
        }
        tracing::info!("Waiting {} seconds...", interval);
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(interval)) => {}
            _ = shutdown_token.cancelled() => {
                tracing::info!("Shutdown during wait, exiting...");
                break;
            }
        }
    }

    Ok(())
}

/// Run the status command.
async fn run_status(args: cli::StatusArgs) -> anyhow::Result<()> {
    let config = StatusConfig::from_cli(args)?;

    if config.ledger.backend == LedgerBackend::Sqlite && !config.ledger.db_path.exists() {
        println!("No ledger database found at {}", config.ledger.db_path.display());
        println!("Run a sync first to create the database.");
    } else {
        let api = match config.client.clone() {
            Some(settings) => Some(Arc::new(FulcrumClient::new(settings)?) as Arc<dyn FormsApi>),
            None => None,
        };
        let ledger = open_ledger(&config.ledger, api, &config.keys).await?;
        let summary = ledger.summary().await?;

        println!("Ledger: {}", ledger.describe());
        println!();
        println!("Processed photos: {}", summary.entries);
        if let Some(records) = summary.distinct_records {
            println!("Records:          {}", records);
        }
        if let Some(last) = &summary.last_recorded {
            println!(
                "Last recorded:    {}",
                last.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }

    let staging = StagingArea::new(config.staging_dir.clone());
    let leftovers = staging.entries().await?;
    println!();
    if leftovers.is_empty() {
        println!("Staging directory {} is empty", staging.dir().display());
    } else {
        println!(
            "Staging directory {} holds {} leftover file(s) (removed on the next sync):",
            staging.dir().display(),
            leftovers.len()
        );
        for path in leftovers {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

fn init_tracing(cli: &cli::Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let cli = cli::Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Command::Sync(args) => run_sync(args).await,
        Command::Status(args) => run_status(args).await,
    }
}
