use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::{json, Value};
use tracing::debug;

use super::error::ApiError;
use super::types::PhotoRef;
use super::{ByteStream, FormsApi};
use crate::types::PhotoQuality;

pub const DEFAULT_BASE_URL: &str = "https://api.fulcrumapp.com/api/v2";
pub const DEFAULT_REPORT_URL: &str = "https://api.fulcrumapp.com/api/v2/records/{record_id}.pdf";

const PER_PAGE: u32 = 1000;

/// Connection settings for [`FulcrumClient`].
#[derive(Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub token: String,
    /// Report URL template; `{record_id}` and `{token}` are substituted.
    pub report_url: String,
    /// Location stamped on lookup rows (the lookup form requires one).
    pub lookup_latitude: f64,
    pub lookup_longitude: f64,
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("report_url", &self.report_url)
            .finish_non_exhaustive()
    }
}

/// `reqwest`-backed Fulcrum API client.
pub struct FulcrumClient {
    http: reqwest::Client,
    settings: ClientSettings,
}

impl std::fmt::Debug for FulcrumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulcrumClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

const JSON: &str = "application/json";

/// Headers sent on every request. Media and report downloads get nothing else.
fn token_headers(token: &str) -> Result<HeaderMap, ApiError> {
    let mut value = HeaderValue::from_str(token)
        .map_err(|_| ApiError::unexpected("client", "API token is not a valid header value"))?;
    value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert("X-ApiToken", value);
    Ok(headers)
}

impl FulcrumClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .default_headers(token_headers(&settings.token)?)
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(|e| ApiError::http("client", e))?;

        Ok(Self { http, settings })
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(self.endpoint_url(endpoint))
            .header(ACCEPT, JSON)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::http(endpoint, e))?;
        let response = check_status(endpoint, response)?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::http(endpoint, e))
    }

    /// Fetch every page of a paginated collection endpoint.
    async fn get_all_pages(
        &self,
        endpoint: &str,
        collection: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut page: u64 = 1;

        loop {
            let mut paged = query.to_vec();
            paged.push(("page", page.to_string()));
            paged.push(("per_page", PER_PAGE.to_string()));

            let mut body = self.get_json(endpoint, &paged).await?;
            let batch = match body.get_mut(collection).and_then(|v| v.as_array_mut()) {
                Some(batch) => std::mem::take(batch),
                None => {
                    return Err(ApiError::unexpected(
                        endpoint,
                        format!("no '{}' array in response", collection),
                    ))
                }
            };
            let total_pages = body["total_pages"].as_u64().unwrap_or(1);
            debug!(
                endpoint,
                page,
                total_pages,
                count = batch.len(),
                "Fetched page"
            );

            let empty = batch.is_empty();
            items.extend(batch);
            if empty || page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    async fn get_stream(&self, endpoint: &'static str, url: &str) -> Result<ByteStream, ApiError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::http(endpoint, e))?;
        let response = check_status(endpoint, response)?;
        let stream = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ApiError::http(endpoint, e))
        });
        Ok(stream.boxed())
    }
}

fn check_status(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::HttpStatus {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        })
    }
}

/// Path of a photo's media relative to the API base.
pub(crate) fn media_path(access_key: &str, quality: PhotoQuality) -> String {
    match quality {
        PhotoQuality::Original => format!("photos/{}.jpg", access_key),
        PhotoQuality::Large => format!("photos/{}/large.jpg", access_key),
        PhotoQuality::Thumbnail => format!("photos/{}/thumbnail.jpg", access_key),
    }
}

/// Expand the report URL template for one record.
pub(crate) fn report_url(template: &str, record_id: &str, token: &str) -> String {
    template
        .replace("{record_id}", record_id)
        .replace("{token}", token)
}

#[async_trait]
impl FormsApi for FulcrumClient {
    async fn list_records(
        &self,
        form_id: &str,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, ApiError> {
        let mut query = vec![("form_id", form_id.to_string())];
        if let Some(since) = updated_since {
            query.push(("updated_since", since.timestamp().to_string()));
        }
        self.get_all_pages("records.json", "records", &query).await
    }

    async fn list_photos(&self, form_id: &str, record_id: &str) -> Result<Vec<PhotoRef>, ApiError> {
        let query = [
            ("form_id", form_id.to_string()),
            ("record_id", record_id.to_string()),
        ];
        let photos = self.get_all_pages("photos.json", "photos", &query).await?;
        photos
            .into_iter()
            .map(|p| serde_json::from_value(p).map_err(ApiError::from))
            .collect()
    }

    async fn download_photo_media(
        &self,
        access_key: &str,
        quality: PhotoQuality,
    ) -> Result<ByteStream, ApiError> {
        let url = self.endpoint_url(&media_path(access_key, quality));
        self.get_stream("photo media", &url).await
    }

    async fn render_report_pdf(&self, record_id: &str) -> Result<ByteStream, ApiError> {
        let url = report_url(&self.settings.report_url, record_id, &self.settings.token);
        self.get_stream("report", &url).await
    }

    async fn query_lookup_table(&self, form_id: &str) -> Result<Vec<Value>, ApiError> {
        let query = [("form_id", form_id.to_string())];
        self.get_all_pages("records.json", "records", &query).await
    }

    async fn insert_lookup_row(
        &self,
        form_id: &str,
        form_values: Value,
    ) -> Result<Value, ApiError> {
        let endpoint = "records.json";
        let body = json!({
            "record": {
                "form_id": form_id,
                "latitude": self.settings.lookup_latitude,
                "longitude": self.settings.lookup_longitude,
                "form_values": form_values,
            }
        });
        let response = self
            .http
            .post(self.endpoint_url(endpoint))
            .header(ACCEPT, JSON)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::http(endpoint, e))?;
        let response = check_status(endpoint, response)?;
        let mut created: Value = response
            .json()
            .await
            .map_err(|e| ApiError::http(endpoint, e))?;
        match created.get_mut("record") {
            Some(record) => Ok(record.take()),
            None => Err(ApiError::unexpected(endpoint, "no 'record' in response")),
        }
    }
}
