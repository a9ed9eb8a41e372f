use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::LedgerError;
use super::types::LedgerEntry;
use super::Ledger;
use crate::fulcrum::{FieldKeys, FormsApi};

/// Ledger kept as rows of a Fulcrum lookup form.
///
/// Each row carries the access key and project number of one processed
/// photo.
pub struct LookupTableLedger {
    api: Arc<dyn FormsApi>,
    form_id: String,
    keys: FieldKeys,
}

impl std::fmt::Debug for LookupTableLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupTableLedger")
            .field("form_id", &self.form_id)
            .finish_non_exhaustive()
    }
}

impl LookupTableLedger {
    pub fn new(api: Arc<dyn FormsApi>, form_id: impl Into<String>, keys: FieldKeys) -> Self {
        Self {
            api,
            form_id: form_id.into(),
            keys,
        }
    }
}

#[async_trait]
impl Ledger for LookupTableLedger {
    async fn snapshot(&self) -> Result<HashSet<String>, LedgerError> {
        let rows = self.api.query_lookup_table(&self.form_id).await?;
        let field = self.keys.lookup_access_key.as_str();

        let mut keys = HashSet::with_capacity(rows.len());
        for row in &rows {
            match row["form_values"][field].as_str().map(str::trim) {
                Some(key) if !key.is_empty() => {
                    keys.insert(key.to_string());
                }
                _ => {
                    tracing::warn!(
                        row_id = row["id"].as_str().unwrap_or("<unknown>"),
                        field,
                        "Lookup row has no access key, ignoring"
                    );
                }
            }
        }

        tracing::debug!(rows = rows.len(), keys = keys.len(), "Loaded lookup ledger");
        Ok(keys)
    }

    async fn append(&self, mut entry: LedgerEntry) -> Result<LedgerEntry, LedgerError> {
        let mut values = Map::new();
        values.insert(
            self.keys.lookup_access_key.clone(),
            Value::String(entry.access_key.clone()),
        );
        values.insert(
            self.keys.lookup_project_number.clone(),
            Value::String(entry.project_number.clone()),
        );

        let created = self
            .api
            .insert_lookup_row(&self.form_id, Value::Object(values))
            .await?;
        entry.remote_id = created["id"].as_str().map(str::to_string);
        tracing::debug!(
            access_key = %entry.access_key,
            row_id = entry.remote_id.as_deref().unwrap_or(""),
            "Inserted lookup row"
        );
        Ok(entry)
    }

    fn describe(&self) -> String {
        format!("lookup form {}", self.form_id)
    }
}
