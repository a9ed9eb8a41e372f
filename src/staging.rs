//! Staging directory for downloads that have not been archived yet.
//!
//! Photos land at `<accessKey>.jpg`, reports at `report_<recordId>.pdf`. The
//! directory is emptied after every record, so anything found in it at the
//! start of a pass was left behind by an interrupted run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed and purge leftovers from earlier runs.
    /// Returns the number of entries purged.
    pub async fn prepare(&self) -> std::io::Result<usize> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let leftovers = self.entries().await?;
        if !leftovers.is_empty() {
            tracing::warn!(
                count = leftovers.len(),
                dir = %self.dir.display(),
                "Staging directory not empty, purging leftovers from a previous run"
            );
        }
        self.clear().await
    }

    /// Staging path for a photo, or `None` if `access_key` is not a plain
    /// file name.
    pub fn photo_path(&self, access_key: &str) -> Option<PathBuf> {
        is_plain_name(access_key).then(|| self.dir.join(format!("{}.jpg", access_key)))
    }

    /// Staging path for a record's report PDF.
    pub fn report_path(&self, record_id: &str) -> Option<PathBuf> {
        is_plain_name(record_id).then(|| self.dir.join(format!("report_{}.pdf", record_id)))
    }

    /// Everything currently in the staging directory. A missing directory is
    /// reported as empty.
    pub async fn entries(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        Ok(paths)
    }

    pub async fn is_empty(&self) -> std::io::Result<bool> {
        Ok(self.entries().await?.is_empty())
    }

    /// Remove every entry. Returns how many were removed.
    pub async fn clear(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for path in self.entries().await? {
            let result = match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "Cleared staging directory");
        }
        Ok(removed)
    }
}

/// A name that stays inside the directory it is joined to.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}
