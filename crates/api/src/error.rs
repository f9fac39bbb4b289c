//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chargebook_core::engine::EngineError;
use serde::Serialize;
use tracing::{error, warn};

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `LEDGER_LOCKED`.
    pub error: &'static str,
    /// Human-readable message.
    pub message: String,
    /// True if the same request may succeed later.
    pub retryable: bool,
}

/// An engine error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %err, code = err.error_code(), "Request failed");
        } else {
            warn!(error = %err, code = err.error_code(), "Request rejected");
        }

        let body = ErrorBody {
            error: err.error_code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
