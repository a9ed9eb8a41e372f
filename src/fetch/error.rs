use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::fulcrum::ApiError;

/// Failure to stage a single download.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The server returned no bytes; the staged file has been removed.
    #[error("Downloaded file {0} is empty")]
    Empty(PathBuf),

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    /// The identifier cannot be used as a staging file name.
    #[error("Refusing to stage {0:?}: not a plain file name")]
    UnsafeName(String),
}

/// Failure that stops fetching for a whole record.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to list photos: {0}")]
    ListPhotos(#[source] ApiError),

    #[error("Failed to resolve archive folder: {0}")]
    Resolve(#[from] ArchiveError),

    #[error("Failed to fetch report: {0}")]
    Report(#[source] DownloadError),
}
