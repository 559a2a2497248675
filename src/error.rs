use reqwest::StatusCode;
use thiserror::Error;

use crate::types::ErrorResponse;

/// Every failure the proxy can surface. None of them are retried.
#[derive(Debug, Error)]
pub enum KalshiError {
    /// Inbound caller did not present the shared service key.
    #[error("unauthorized")]
    Unauthorized,

    /// Upstream answered with something other than `200 OK`.
    ///
    /// `raw_body` is the upstream body verbatim; `api_error` is a best-effort
    /// parse of it for logging only.
    #[error("upstream returned {status}: {raw_body}")]
    Upstream {
        status: StatusCode,
        api_error: Option<ErrorResponse>,
        raw_body: String,
        request_id: Option<String>,
    },

    /// The upstream could not be reached or the body could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A caller-supplied parameter is outside its allowed range.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("pagination cancelled")]
    Cancelled,

    #[error("pagination deadline exceeded")]
    DeadlineExceeded,

    /// The signing key could not be loaded.
    #[error("private key error: {0}")]
    Key(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid header value: {0}")]
    Header(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KalshiError {
    /// Upstream status code, if this error came from a non-200 response.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            KalshiError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}
