//! Photo and report fetcher.
//!
//! For one record: decide which photos are new, make sure the record's report
//! PDF is (or already was) in the archive, and stream the new photos into the
//! staging directory with bounded concurrency.

pub mod error;
pub mod file;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::archive::{ArchiveWriter, PathResolver};
use crate::fulcrum::{FormsApi, Record};
use crate::staging::StagingArea;
use crate::types::PhotoQuality;

pub use error::{DownloadError, FetchError};

/// Subset of application config consumed by the fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub form_id: String,
    pub quality: PhotoQuality,
    pub concurrency: usize,
}

/// State of a record's report after fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    /// Rendered and staged at this path.
    Staged(PathBuf),
    /// The archive already holds it at this path; nothing was rendered.
    AlreadyArchived(PathBuf),
}

/// Result of staging one photo.
#[derive(Debug)]
pub struct PhotoDownload {
    pub access_key: String,
    pub result: Result<PathBuf, DownloadError>,
}

/// Everything [`Fetcher::fetch`] learned and staged for one record.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub photos_listed: usize,
    /// Archive folder; `None` when the record had no unseen photos.
    pub destination: Option<PathBuf>,
    pub report: Option<ReportStatus>,
    pub downloads: Vec<PhotoDownload>,
}

impl FetchReport {
    /// True when every listed photo was already in the ledger.
    pub fn is_unchanged(&self) -> bool {
        self.destination.is_none()
    }
}

pub struct Fetcher {
    api: Arc<dyn FormsApi>,
    resolver: PathResolver,
    staging: StagingArea,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(
        api: Arc<dyn FormsApi>,
        resolver: PathResolver,
        staging: StagingArea,
        config: FetchConfig,
    ) -> Self {
        Self {
            api,
            resolver,
            staging,
            config,
        }
    }

    /// Fetch the unseen photos of `record` (and its report) into staging.
    ///
    /// `processed` is the ledger snapshot taken for this record. Per-photo
    /// failures are returned in [`FetchReport::downloads`]; only listing,
    /// folder resolution, and report failures abort the record.
    pub async fn fetch(
        &self,
        record: &Record,
        processed: &HashSet<String>,
    ) -> Result<FetchReport, FetchError> {
        let photos = self
            .api
            .list_photos(&self.config.form_id, &record.id)
            .await
            .map_err(FetchError::ListPhotos)?;

        let mut seen = HashSet::new();
        let unseen: Vec<String> = photos
            .iter()
            .map(|p| p.access_key.as_str())
            .filter(|key| !processed.contains(*key) && seen.insert(*key))
            .map(str::to_string)
            .collect();

        let mut report = FetchReport {
            photos_listed: photos.len(),
            ..FetchReport::default()
        };
        if unseen.is_empty() {
            tracing::debug!(photos = photos.len(), "No unseen photos");
            return Ok(report);
        }
        tracing::info!(
            photos = photos.len(),
            unseen = unseen.len(),
            "Record has unseen photos"
        );

        let destination = self
            .resolver
            .resolve_archive_folder(record.branch.as_deref(), &record.project_number)
            .await?;

        report.report = Some(self.fetch_report(record, &destination).await?);
        report.destination = Some(destination);
        report.downloads = self.fetch_photos(unseen).await;
        Ok(report)
    }

    async fn fetch_report(
        &self,
        record: &Record,
        destination: &std::path::Path,
    ) -> Result<ReportStatus, FetchError> {
        let archived = ArchiveWriter::report_destination(
            destination,
            &record.project_number,
            record.field_visit_notes.as_deref(),
        );
        if tokio::fs::try_exists(&archived).await.unwrap_or(false) {
            tracing::debug!(path = %archived.display(), "Report already archived");
            return Ok(ReportStatus::AlreadyArchived(archived));
        }

        let staged = self
            .staging
            .report_path(&record.id)
            .ok_or_else(|| FetchError::Report(DownloadError::UnsafeName(record.id.clone())))?;

        tracing::debug!(path = %staged.display(), "Downloading report");
        let body = self
            .api
            .render_report_pdf(&record.id)
            .await
            .map_err(|e| FetchError::Report(e.into()))?;
        let bytes = file::stream_to_file(body, &staged)
            .await
            .map_err(FetchError::Report)?;
        tracing::info!(path = %staged.display(), bytes, "Downloaded report");
        Ok(ReportStatus::Staged(staged))
    }

    /// Download every key; all results are returned, failures included.
    async fn fetch_photos(&self, keys: Vec<String>) -> Vec<PhotoDownload> {
        stream::iter(keys)
            .map(|access_key| async move {
                let result = self.fetch_photo(&access_key).await;
                if let Err(e) = &result {
                    tracing::warn!(access_key = %access_key, error = %e, "Photo download failed");
                }
                PhotoDownload { access_key, result }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    async fn fetch_photo(&self, access_key: &str) -> Result<PathBuf, DownloadError> {
        let path = self
            .staging
            .photo_path(access_key)
            .ok_or_else(|| DownloadError::UnsafeName(access_key.to_string()))?;

        tracing::debug!(access_key, quality = self.config.quality.as_str(), "Downloading photo");
        let body = self
            .api
            .download_photo_media(access_key, self.config.quality)
            .await?;
        let bytes = file::stream_to_file(body, &path).await?;
        tracing::debug!(access_key, bytes, path = %path.display(), "Downloaded photo");
        Ok(path)
    }
}
