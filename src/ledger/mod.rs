//! Dedup ledger: the durable set of photo access keys that have already been
//! downloaded and archived.
//!
//! Two backends exist. The lookup-table ledger stores one row per photo in a
//! companion Fulcrum form so that every installation sees the same history;
//! the SQLite ledger keeps the same information in a local database file.

pub mod error;
pub mod lookup;
pub mod schema;
pub mod sqlite;
pub mod types;

use std::collections::HashSet;

use async_trait::async_trait;

pub use error::LedgerError;
pub use lookup::LookupTableLedger;
pub use sqlite::SqliteLedger;
pub use types::{LedgerEntry, LedgerSummary};

/// Repository of processed access keys.
///
/// Object-safe; shared as `Arc<dyn Ledger>`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Every access key recorded so far.
    ///
    /// Called once per record before any download decision is made; the
    /// returned set is not updated by later appends.
    async fn snapshot(&self) -> Result<HashSet<String>, LedgerError>;

    /// Record a photo as processed. Appending a key that is already present
    /// succeeds.
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry, LedgerError>;

    /// Totals for status reporting.
    async fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let keys = self.snapshot().await?;
        Ok(LedgerSummary {
            entries: keys.len() as u64,
            ..LedgerSummary::default()
        })
    }

    /// Human-readable location of the ledger.
    fn describe(&self) -> String;
}
