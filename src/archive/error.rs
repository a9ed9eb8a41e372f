use std::path::PathBuf;

use thiserror::Error;

/// Filesystem errors while routing or copying into the archive. All of them
/// are fatal to the record being processed.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Staged file {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("Staged file {0} disappeared before it could be copied")]
    SourceVanished(PathBuf),

    #[error("Destination {path} is unavailable: {reason}")]
    DestinationUnavailable { path: PathBuf, reason: String },

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to list {path}: {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}
