use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use thiserror::Error;

use crate::util::error_response;

/// Everything that can stop a relay request.
///
/// Upstream failures keep the remote status and body so the caller sees exactly
/// what the Assistants API returned; local failures collapse into a 500 carrying
/// the error's display string.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Required setting (named for the log) is missing; the body stays generic.
    #[error("not configured")]
    NotConfigured(&'static str),

    #[error("{0}")]
    BadRequest(String),

    /// Non-success JSON API response, relayed verbatim.
    #[error("upstream returned {status}")]
    Upstream {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// Non-success transcription response; the raw text is wrapped as `{error}`.
    #[error("upstream transcription returned {status}: {text}")]
    UpstreamText { status: StatusCode, text: String },

    #[error("run {run_id} still {status} after {attempts} status checks")]
    PollTimeout {
        run_id: String,
        status: String,
        attempts: u32,
    },

    #[error("{0}")]
    RunNotCompleted(String),

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream { status, .. } | RelayError::UpstreamText { status, .. } => {
                *status
            }
            RelayError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::RunNotCompleted(_) => StatusCode::BAD_GATEWAY,
            RelayError::Multipart(e) => e.status(),
            RelayError::Http(_) | RelayError::Decode(_) | RelayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::Upstream {
                status,
                content_type,
                body,
            } => {
                let content_type = content_type
                    .unwrap_or_else(|| HeaderValue::from_static("application/json"));
                (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            RelayError::UpstreamText { status, text } => error_response(status, &text),
            RelayError::NotConfigured(setting) => {
                tracing::error!(setting, "relay request refused: setting missing");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "not configured")
            }
            other => {
                let status = other.status();
                if status.is_server_error() {
                    tracing::error!(error = %other, "relay request failed");
                }
                error_response(status, &other.to_string())
            }
        }
    }
}
