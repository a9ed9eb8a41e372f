//! In-memory [`FormsApi`] used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};

use crate::fulcrum::{ApiError, ByteStream, FieldKeys, FormsApi, PhotoRef};
use crate::types::PhotoQuality;

pub(crate) const FAKE_PDF: &[u8] = b"%PDF-1.4 fake report";

#[derive(Default)]
struct FakeState {
    records: Vec<Value>,
    photos: HashMap<String, Vec<PhotoRef>>,
    media: HashMap<String, Vec<u8>>,
    reports: HashMap<String, Vec<u8>>,
    lookup_rows: Vec<Value>,
    failing_photo_lists: HashSet<String>,
    failing_media: HashSet<String>,
    failing_lookup_inserts: HashSet<String>,
    last_updated_since: Option<DateTime<Utc>>,
}

/// Fake Fulcrum account with call counters and failure injection.
#[derive(Default)]
pub(crate) struct FakeFormsApi {
    state: Mutex<FakeState>,
    list_records_calls: AtomicUsize,
    list_photos_calls: AtomicUsize,
    media_downloads: AtomicUsize,
    report_renders: AtomicUsize,
    lookup_inserts: AtomicUsize,
}

impl FakeFormsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record whose photos carry the given `(access_key, caption)` pairs.
    pub fn add_record(
        &self,
        id: &str,
        status: &str,
        project_number: &str,
        branch: Option<&str>,
        photos: &[(&str, &str)],
    ) {
        let keys = FieldKeys::default();
        let entries: Vec<Value> = photos
            .iter()
            .map(|(key, caption)| json!({"photo_id": key, "caption": caption}))
            .collect();
        let mut form_values = serde_json::Map::new();
        form_values.insert(keys.project_number.clone(), json!(project_number));
        form_values.insert(keys.field_visit_notes.clone(), json!("Site visit"));
        if let Some(branch) = branch {
            form_values.insert(
                keys.branch.clone(),
                json!({"choice_values": [branch], "other_values": []}),
            );
        }
        form_values.insert("photos".to_string(), Value::Array(entries));

        let doc = json!({
            "id": id,
            "status": status,
            "updated_at": "2025-03-04T15:16:17Z",
            "form_values": form_values,
        });

        let mut state = self.state.lock().unwrap();
        state.records.push(doc);
        state.photos.insert(
            id.to_string(),
            photos
                .iter()
                .map(|(key, _)| PhotoRef {
                    access_key: key.to_string(),
                })
                .collect(),
        );
        for (key, _) in photos {
            state
                .media
                .insert(key.to_string(), format!("jpeg-bytes-{}", key).into_bytes());
        }
    }

    pub fn add_raw_record(&self, doc: Value) {
        self.state.lock().unwrap().records.push(doc);
    }

    pub fn set_media(&self, access_key: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .media
            .insert(access_key.to_string(), bytes.to_vec());
    }

    pub fn set_report(&self, record_id: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .reports
            .insert(record_id.to_string(), bytes.to_vec());
    }

    pub fn add_lookup_row(&self, row: Value) {
        self.state.lock().unwrap().lookup_rows.push(row);
    }

    pub fn fail_photo_list(&self, record_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_photo_lists
            .insert(record_id.to_string());
    }

    pub fn fail_media(&self, access_key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_media
            .insert(access_key.to_string());
    }

    /// Make lookup inserts fail for rows carrying `access_key`.
    pub fn fail_lookup_insert(&self, access_key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_lookup_inserts
            .insert(access_key.to_string());
    }

    pub fn lookup_rows(&self) -> Vec<Value> {
        self.state.lock().unwrap().lookup_rows.clone()
    }

    pub fn last_updated_since(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().last_updated_since
    }

    pub fn list_records_calls(&self) -> usize {
        self.list_records_calls.load(Ordering::SeqCst)
    }

    pub fn list_photos_calls(&self) -> usize {
        self.list_photos_calls.load(Ordering::SeqCst)
    }

    pub fn media_downloads(&self) -> usize {
        self.media_downloads.load(Ordering::SeqCst)
    }

    pub fn report_renders(&self) -> usize {
        self.report_renders.load(Ordering::SeqCst)
    }

    pub fn lookup_inserts(&self) -> usize {
        self.lookup_inserts.load(Ordering::SeqCst)
    }
}

fn server_error(endpoint: &str) -> ApiError {
    ApiError::HttpStatus {
        status: 500,
        endpoint: endpoint.to_string(),
    }
}

fn byte_stream(bytes: Vec<u8>) -> ByteStream {
    // Two chunks so the writer loop sees more than one.
    let mid = bytes.len() / 2;
    let (head, tail) = bytes.split_at(mid);
    stream::iter(vec![Ok(head.to_vec()), Ok(tail.to_vec())]).boxed()
}

#[async_trait]
impl FormsApi for FakeFormsApi {
    async fn list_records(
        &self,
        _form_id: &str,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, ApiError> {
        self.list_records_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.last_updated_since = updated_since;
        Ok(state.records.clone())
    }

    async fn list_photos(&self, _form_id: &str, record_id: &str) -> Result<Vec<PhotoRef>, ApiError> {
        self.list_photos_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing_photo_lists.contains(record_id) {
            return Err(server_error("photos.json"));
        }
        Ok(state.photos.get(record_id).cloned().unwrap_or_default())
    }

    async fn download_photo_media(
        &self,
        access_key: &str,
        _quality: PhotoQuality,
    ) -> Result<ByteStream, ApiError> {
        self.media_downloads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing_media.contains(access_key) {
            return Err(server_error("photo media"));
        }
        match state.media.get(access_key) {
            Some(bytes) => Ok(byte_stream(bytes.clone())),
            None => Err(ApiError::HttpStatus {
                status: 404,
                endpoint: "photo media".to_string(),
            }),
        }
    }

    async fn render_report_pdf(&self, record_id: &str) -> Result<ByteStream, ApiError> {
        self.report_renders.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let bytes = state
            .reports
            .get(record_id)
            .cloned()
            .unwrap_or_else(|| FAKE_PDF.to_vec());
        Ok(byte_stream(bytes))
    }

    async fn query_lookup_table(&self, _form_id: &str) -> Result<Vec<Value>, ApiError> {
        Ok(self.state.lock().unwrap().lookup_rows.clone())
    }

    async fn insert_lookup_row(
        &self,
        _form_id: &str,
        form_values: Value,
    ) -> Result<Value, ApiError> {
        self.lookup_inserts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let rejected = form_values
            .as_object()
            .map(|values| {
                values.values().any(|v| {
                    v.as_str()
                        .is_some_and(|s| state.failing_lookup_inserts.contains(s))
                })
            })
            .unwrap_or(false);
        if rejected {
            return Err(server_error("records.json"));
        }
        let row = json!({
            "id": format!("lookup-{}", state.lookup_rows.len() + 1),
            "form_values": form_values,
        });
        state.lookup_rows.push(row.clone());
        Ok(row)
    }
}
