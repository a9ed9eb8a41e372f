//! Error types for the dedup ledger.

use std::path::PathBuf;

use thiserror::Error;

use crate::fulcrum::ApiError;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to open or create the SQLite ledger file.
    #[error("Failed to open ledger database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Ledger migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    #[error("Ledger query failed: {0}")]
    Query(String),

    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    #[error("Ledger schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },

    /// The remote lookup form rejected a read or write.
    #[error("Lookup table request failed: {0}")]
    Remote(#[from] ApiError),
}

impl LedgerError {
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }
}
