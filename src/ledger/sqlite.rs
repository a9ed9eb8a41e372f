use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::Connection;

use super::error::LedgerError;
use super::schema;
use super::types::{LedgerEntry, LedgerSummary};
use super::Ledger;

/// Ledger stored in a local SQLite database.
pub struct SqliteLedger {
    /// rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// Open or create a ledger database at `path`.
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = path_clone.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        LedgerError::Query(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            let conn = Connection::open(&path_clone).map_err(|e| LedgerError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(LedgerError::Migration)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(LedgerError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, LedgerError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(|e| LedgerError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::Query(e.to_string()))
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn snapshot(&self) -> Result<HashSet<String>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached("SELECT access_key FROM processed_photos")
            .map_err(LedgerError::query)?;

        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(LedgerError::query)?
            .collect::<Result<HashSet<_>, _>>()
            .map_err(LedgerError::query)?;

        Ok(keys)
    }

    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry, LedgerError> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO processed_photos (access_key, record_id, project_number, recorded_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    &entry.access_key,
                    &entry.record_id,
                    &entry.project_number,
                    entry.recorded_at.timestamp(),
                ],
            )
            .map_err(LedgerError::query)?;

        if inserted == 0 {
            tracing::debug!(access_key = %entry.access_key, "Access key already in ledger");
        }
        Ok(entry)
    }

    async fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let conn = self.lock()?;
        let (entries, distinct_records, last): (i64, i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT record_id), MAX(recorded_at) FROM processed_photos",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(LedgerError::query)?;

        Ok(LedgerSummary {
            entries: entries as u64,
            distinct_records: Some(distinct_records as u64),
            last_recorded: last.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
    }

    fn describe(&self) -> String {
        format!("SQLite ledger at {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");
        let ledger = SqliteLedger::open(&path).await.unwrap();
        assert!(path.exists());
        assert!(ledger.snapshot().await.unwrap().is_empty());
        assert!(ledger.describe().contains("ledger.db"));
    }

    #[tokio::test]
    async fn test_append_then_snapshot() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger
            .append(LedgerEntry::for_photo("key-1", "rec-1", "24-001"))
            .await
            .unwrap();
        ledger
            .append(LedgerEntry::for_photo("key-2", "rec-1", "24-001"))
            .await
            .unwrap();

        let keys = ledger.snapshot().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("key-1"));
        assert!(keys.contains("key-2"));
    }

    #[tokio::test]
    async fn test_duplicate_append_tolerated() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let entry = LedgerEntry::for_photo("key-1", "rec-1", "24-001");
        ledger.append(entry.clone()).await.unwrap();
        let again = ledger.append(entry.clone()).await.unwrap();
        assert_eq!(again.access_key, "key-1");
        assert_eq!(ledger.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summary() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        assert_eq!(
            ledger.summary().await.unwrap(),
            LedgerSummary {
                entries: 0,
                distinct_records: Some(0),
                last_recorded: None,
            }
        );

        let mut first = LedgerEntry::for_photo("a", "rec-1", "1");
        first.recorded_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut second = LedgerEntry::for_photo("b", "rec-2", "2");
        second.recorded_at = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
        let third = LedgerEntry {
            access_key: "c".into(),
            recorded_at: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            ..first.clone()
        };
        for entry in [first, second, third] {
            ledger.append(entry).await.unwrap();
        }

        let summary = ledger.summary().await.unwrap();
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.distinct_records, Some(2));
        assert_eq!(
            summary.last_recorded.map(|d| d.timestamp()),
            Some(1_700_000_500)
        );
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let ledger = SqliteLedger::open(&path).await.unwrap();
            ledger
                .append(LedgerEntry::for_photo("persisted", "rec", "1"))
                .await
                .unwrap();
        }
        let reopened = SqliteLedger::open(&path).await.unwrap();
        assert!(reopened.snapshot().await.unwrap().contains("persisted"));
    }
}
