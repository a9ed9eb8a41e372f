//! Synchronization pass: walk the form's records and bring the archive and
//! ledger up to date, one record at a time.
//!
//! Each record is isolated. Whatever goes wrong while snapshotting the
//! ledger, fetching, copying, or recording ends up in that record's
//! [`RecordOutcome::Failed`]; only setup failures (staging directory, record
//! listing) abort the pass. Staging is emptied after every record.

pub mod summary;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::archive::{ArchiveWriter, CopyOutcome};
use crate::config::UpdateWindow;
use crate::fetch::{Fetcher, ReportStatus};
use crate::fulcrum::{FieldKeys, FormsApi, Record};
use crate::ledger::{Ledger, LedgerEntry};
use crate::staging::StagingArea;

pub use summary::{PassSummary, RecordOutcome, RecordResult, RecordStats};

/// Subset of application config consumed by the orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub form_id: String,
    pub keys: FieldKeys,
    pub update_window: UpdateWindow,
    pub no_progress_bar: bool,
}

pub struct SyncEngine {
    api: Arc<dyn FormsApi>,
    ledger: Arc<dyn Ledger>,
    fetcher: Fetcher,
    writer: ArchiveWriter,
    staging: StagingArea,
    config: SyncConfig,
}

/// Returns a hidden bar when disabled or when stdout is not a TTY.
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

impl SyncEngine {
    pub fn new(
        api: Arc<dyn FormsApi>,
        ledger: Arc<dyn Ledger>,
        fetcher: Fetcher,
        writer: ArchiveWriter,
        staging: StagingArea,
        config: SyncConfig,
    ) -> Self {
        Self {
            api,
            ledger,
            fetcher,
            writer,
            staging,
            config,
        }
    }

    /// Run one pass over the form's records.
    ///
    /// Cancelling `shutdown` lets the current record finish; remaining
    /// records are left for the next pass and the summary is marked
    /// interrupted.
    pub async fn run_pass(&self, shutdown: &CancellationToken) -> anyhow::Result<PassSummary> {
        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("pass", pass_id = %pass_id);
        self.run_pass_inner(pass_id, shutdown).instrument(span).await
    }

    async fn run_pass_inner(
        &self,
        pass_id: Uuid,
        shutdown: &CancellationToken,
    ) -> anyhow::Result<PassSummary> {
        let started_at = Utc::now();

        self.staging.prepare().await.with_context(|| {
            format!(
                "Failed to prepare staging directory {}",
                self.staging.dir().display()
            )
        })?;

        let updated_since = self.config.update_window.cutoff(started_at);
        tracing::info!(
            form_id = %self.config.form_id,
            updated_since = ?updated_since,
            "Starting pass"
        );
        let documents = self
            .api
            .list_records(&self.config.form_id, updated_since)
            .await
            .context("Failed to list records")?;
        tracing::info!(records = documents.len(), "Listed records");

        let pb = create_progress_bar(self.config.no_progress_bar, documents.len() as u64);
        let mut records = Vec::with_capacity(documents.len());
        let mut interrupted = false;

        for doc in &documents {
            if shutdown.is_cancelled() {
                pb.suspend(|| tracing::info!("Shutdown requested, stopping before next record"));
                interrupted = true;
                break;
            }
            pb.set_message(doc["id"].as_str().unwrap_or_default().to_string());
            let result = self.process_document(doc).await;
            records.push(result);
            pb.inc(1);
        }
        pb.finish_and_clear();

        if let Err(e) = self.staging.clear().await {
            tracing::warn!(error = %e, "Failed to clear staging directory after pass");
        }

        let summary = PassSummary {
            pass_id,
            started_at,
            finished_at: Utc::now(),
            interrupted,
            records,
        };
        summary.log();
        Ok(summary)
    }

    async fn process_document(&self, doc: &Value) -> RecordResult {
        let record = match Record::from_document(doc, &self.config.keys) {
            Ok(record) => record,
            Err(e) => {
                let record_id = doc["id"].as_str().unwrap_or("<unknown>").to_string();
                tracing::error!(record_id = %record_id, error = %e, "Cannot parse record");
                return RecordResult {
                    record_id,
                    project_number: String::new(),
                    branch: None,
                    outcome: RecordOutcome::Failed {
                        reason: e.to_string(),
                    },
                };
            }
        };

        let outcome = if !record.is_complete() {
            tracing::debug!(
                record_id = %record.id,
                status = %record.status,
                "Skipping record"
            );
            RecordOutcome::Skipped {
                reason: format!("status is '{}'", record.status),
            }
        } else {
            let span = tracing::info_span!(
                "record",
                record_id = %record.id,
                project_number = %record.project_number
            );
            self.process_record(&record).instrument(span).await
        };

        RecordResult {
            record_id: record.id,
            project_number: record.project_number,
            branch: record.branch,
            outcome,
        }
    }

    async fn process_record(&self, record: &Record) -> RecordOutcome {
        tracing::info!(
            branch = record.branch.as_deref().unwrap_or(""),
            updated_at = ?record.updated_at,
            "Processing record"
        );

        let outcome = match self.sync_record(record).await {
            Ok(outcome) => outcome,
            Err(e) => RecordOutcome::Failed {
                reason: format!("{:#}", e),
            },
        };

        match &outcome {
            RecordOutcome::Failed { reason } => tracing::error!(
                record_id = %record.id,
                project_number = %record.project_number,
                branch = record.branch.as_deref().unwrap_or(""),
                reason = %reason,
                "Record failed"
            ),
            RecordOutcome::Completed(stats) => tracing::info!(
                photos_downloaded = stats.photos_downloaded,
                photos_copied = stats.photos_copied,
                photos_recorded = stats.photos_recorded,
                photos_already_archived = stats.photos_already_archived,
                report_copied = stats.report_copied,
                "Record complete"
            ),
            _ => tracing::debug!("Record unchanged"),
        }

        if let Err(e) = self.staging.clear().await {
            tracing::warn!(error = %e, "Failed to clear staging directory");
        }
        outcome
    }

    async fn sync_record(&self, record: &Record) -> anyhow::Result<RecordOutcome> {
        let processed = self
            .ledger
            .snapshot()
            .await
            .context("Failed to read ledger")?;

        let fetched = self.fetcher.fetch(record, &processed).await?;
        if fetched.is_unchanged() {
            tracing::debug!(photos = fetched.photos_listed, "Every photo already recorded");
            return Ok(RecordOutcome::Unchanged);
        }
        let Some(destination) = fetched.destination.as_deref() else {
            anyhow::bail!("Fetch produced no archive folder");
        };

        let mut stats = RecordStats::default();

        if let Some(ReportStatus::Staged(staged)) = &fetched.report {
            let outcome = self.copy(staged, destination, record).await?;
            stats.report_copied = matches!(outcome, CopyOutcome::Copied(_));
        }

        let mut problems = Vec::new();
        for download in &fetched.downloads {
            let staged = match &download.result {
                Ok(path) => path,
                Err(e) => {
                    problems.push(format!("{}: {}", download.access_key, e));
                    continue;
                }
            };
            stats.photos_downloaded += 1;

            match self.copy(staged, destination, record).await? {
                CopyOutcome::Copied(_) => stats.photos_copied += 1,
                CopyOutcome::AlreadyArchived(_) => stats.photos_already_archived += 1,
            }

            let entry =
                LedgerEntry::for_photo(&download.access_key, &record.id, &record.project_number);
            match self.ledger.append(entry).await {
                Ok(_) => stats.photos_recorded += 1,
                Err(e) => {
                    tracing::error!(
                        access_key = %download.access_key,
                        error = %e,
                        "Failed to record photo in ledger"
                    );
                    problems.push(format!("{}: {}", download.access_key, e));
                }
            }
        }

        if !problems.is_empty() {
            return Ok(RecordOutcome::Failed {
                reason: format!(
                    "{} photo(s) not archived and recorded: {}",
                    problems.len(),
                    problems.join("; ")
                ),
            });
        }
        Ok(RecordOutcome::Completed(stats))
    }

    async fn copy(
        &self,
        staged: &Path,
        destination: &Path,
        record: &Record,
    ) -> anyhow::Result<CopyOutcome> {
        self.writer
            .copy(
                staged,
                destination,
                &record.photos,
                &record.project_number,
                record.field_visit_notes.as_deref(),
            )
            .await
            .with_context(|| format!("Failed to archive {}", staged.display()))
    }
}
