use thiserror::Error;

/// Errors raised while talking to the Fulcrum API.
///
/// None of these are retried inside a pass; the next scheduled pass picks the
/// work up again.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP {status} from {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    #[error("Request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("Unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    #[error("Record document has no {0} field")]
    MissingField(&'static str),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Wrap a transport error. The URL is stripped since report URLs may
    /// embed the API token.
    pub(crate) fn http(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            source: source.without_url(),
        }
    }

    pub(crate) fn unexpected(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}
