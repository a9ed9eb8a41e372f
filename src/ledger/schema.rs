//! SQLite ledger schema and migrations.

use rusqlite::Connection;

use super::error::LedgerError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS processed_photos (
    access_key TEXT PRIMARY KEY NOT NULL,
    record_id TEXT NOT NULL,
    project_number TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_processed_photos_record ON processed_photos(record_id);
"#;

pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, LedgerError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the ledger schema. Idempotent.
pub(crate) fn migrate(conn: &Connection) -> Result<(), LedgerError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(LedgerError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        migrate_to_version(conn, version)?;
    }

    Ok(())
}

fn migrate_to_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    match version {
        1 => conn.execute_batch(SCHEMA_V1)?,
        other => {
            return Err(LedgerError::Query(format!(
                "no migration defined for schema version {}",
                other
            )))
        }
    }
    set_schema_version(conn, version)?;
    tracing::debug!(version, "Migrated ledger schema");
    Ok(())
}
