use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;
use super::metadata::{self, PhotoMetadata};

/// Workflow status a record must carry to be archived.
pub const COMPLETE_STATUS: &str = "Complete";

/// Data-name keys of the form fields the pipeline reads and writes.
///
/// Defaults match the deployed inspection form and its lookup form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKeys {
    pub project_number: String,
    pub field_visit_notes: String,
    pub branch: String,
    pub lookup_access_key: String,
    pub lookup_project_number: String,
}

impl Default for FieldKeys {
    fn default() -> Self {
        Self {
            project_number: "bfd0".to_string(),
            field_visit_notes: "638f".to_string(),
            branch: "4730".to_string(),
            lookup_access_key: "2426".to_string(),
            lookup_project_number: "cb30".to_string(),
        }
    }
}

/// A photo attached to a record, as listed by `photos.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoRef {
    pub access_key: String,
}

/// One inspection record, reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    pub status: String,
    pub project_number: String,
    pub branch: Option<String>,
    pub field_visit_notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Captioned photo entries found anywhere in the record document.
    pub photos: Vec<PhotoMetadata>,
}

impl Record {
    /// Decode a record from the raw API document.
    ///
    /// Only `id` is mandatory. Missing form values decode to empty/`None` so
    /// that routing can fall back instead of dropping the record.
    pub fn from_document(doc: &Value, keys: &FieldKeys) -> Result<Self, ApiError> {
        let id = doc["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::MissingField("id"))?
            .to_string();
        let status = doc["status"].as_str().unwrap_or_default().to_string();
        let form_values = &doc["form_values"];

        let project_number = text_value(&form_values[keys.project_number.as_str()])
            .unwrap_or_default();
        let field_visit_notes = text_value(&form_values[keys.field_visit_notes.as_str()]);
        let branch = text_value(&form_values[keys.branch.as_str()]);

        let updated_at = doc["updated_at"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            id,
            status,
            project_number,
            branch,
            field_visit_notes,
            updated_at,
            photos: metadata::collect_photo_metadata(doc),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.status == COMPLETE_STATUS
    }
}

/// Read a form value as display text.
///
/// Text fields arrive as strings, numeric fields as numbers, and choice fields
/// as `{"choice_values": [...], "other_values": [...]}`; the first selected
/// value wins.
fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => {
            return ["choice_values", "other_values"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(text_value);
        }
        Value::Array(items) => return items.iter().find_map(text_value),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
