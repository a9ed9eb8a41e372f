//! Fulcrum forms API surface consumed by the sync pipeline.
//!
//! The pipeline only ever talks to [`FormsApi`]; [`FulcrumClient`] is the
//! `reqwest` implementation used in production.

pub mod client;
pub mod error;
pub mod metadata;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::types::PhotoQuality;

pub use client::{ClientSettings, FulcrumClient};
pub use error::ApiError;
pub use types::{FieldKeys, PhotoRef, Record};

/// Chunked response body (photo media, rendered reports).
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

/// Remote operations the pipeline depends on.
///
/// Object-safe so it can be shared as `Arc<dyn FormsApi>` between the
/// fetcher, the lookup-table ledger, and the orchestrator.
#[async_trait]
pub trait FormsApi: Send + Sync {
    /// Raw record documents of `form_id`, optionally limited to records
    /// updated at or after `updated_since`.
    async fn list_records(
        &self,
        form_id: &str,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, ApiError>;

    /// Photos attached to one record.
    async fn list_photos(&self, form_id: &str, record_id: &str) -> Result<Vec<PhotoRef>, ApiError>;

    async fn download_photo_media(
        &self,
        access_key: &str,
        quality: PhotoQuality,
    ) -> Result<ByteStream, ApiError>;

    /// Server-rendered PDF report for a record.
    async fn render_report_pdf(&self, record_id: &str) -> Result<ByteStream, ApiError>;

    /// All rows of the lookup form backing the dedup ledger.
    async fn query_lookup_table(&self, form_id: &str) -> Result<Vec<Value>, ApiError>;

    /// Create a lookup row and return the created record document.
    async fn insert_lookup_row(&self, form_id: &str, form_values: Value)
        -> Result<Value, ApiError>;
}
