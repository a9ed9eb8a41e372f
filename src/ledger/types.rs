use chrono::{DateTime, Utc};

/// One processed photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub access_key: String,
    pub record_id: String,
    pub project_number: String,
    pub recorded_at: DateTime<Utc>,
    /// Id of the lookup row backing this entry (remote ledger only).
    pub remote_id: Option<String>,
}

impl LedgerEntry {
    /// Entry for a photo archived just now.
    pub fn for_photo(access_key: &str, record_id: &str, project_number: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            record_id: record_id.to_string(),
            project_number: project_number.to_string(),
            recorded_at: Utc::now(),
            remote_id: None,
        }
    }
}

/// Ledger contents as reported by the `status` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub entries: u64,
    /// Only known for backends that keep the owning record.
    pub distinct_records: Option<u64>,
    pub last_recorded: Option<DateTime<Utc>>,
}
