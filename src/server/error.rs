//! Mapping of proxy failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coral_club_core::{KvError, MergeError, PatchError};
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    /// Body is not valid JSON or lacks a required field.
    BadRequest(String),
    Kv(KvError),
    Merge(MergeError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        let code = match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Kv(e) => e.http_status(),
            ApiError::Merge(e) => e.http_status(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Kv(KvError::Status { .. }) => "upstream_status",
            ApiError::Kv(_) => "upstream_unavailable",
            ApiError::Merge(MergeError::Patch(_)) => "invalid_patch",
            ApiError::Merge(_) => "merge_failed",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "{}", msg),
            ApiError::Kv(e) => write!(f, "{}", e),
            ApiError::Merge(e) => write!(f, "{}", e),
        }
    }
}

impl From<KvError> for ApiError {
    fn from(e: KvError) -> Self {
        ApiError::Kv(e)
    }
}

impl From<MergeError> for ApiError {
    fn from(e: MergeError) -> Self {
        ApiError::Merge(e)
    }
}

impl From<PatchError> for ApiError {
    fn from(e: PatchError) -> Self {
        ApiError::Merge(MergeError::Patch(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self);
        } else {
            tracing::debug!("Request rejected with {}: {}", status, self);
        }

        // Upstream bodies are passed through as-is.
        if let ApiError::Kv(KvError::Status { body, .. }) = self {
            return (status, body).into_response();
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
