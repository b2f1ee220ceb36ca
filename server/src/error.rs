//! HTTP error mapping.
//!
//! Every failure leaves the service as `{"success": false, "code": ..., "error": ...}`
//! with a stable machine-readable `code`. Clients branch on `code`,
//! never on the message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use onecode_license::LicenseError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Stable error code constants.
pub mod error_code {
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Error body returned for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub error: String,
}

/// Request-level failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Admin credential mismatch. HTTP 403.
    #[error("admin credential rejected")]
    Unauthorized,

    /// Mutation on a code that does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Storage backend failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => error_code::VALIDATION_FAILED,
            ApiError::Unauthorized => error_code::PERMISSION_DENIED,
            ApiError::NotFound(_) => error_code::NOT_FOUND,
            ApiError::Storage(_) => error_code::STORAGE_ERROR,
            ApiError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        match err {
            LicenseError::Validation(msg) => ApiError::Validation(msg),
            LicenseError::Unauthorized => ApiError::Unauthorized,
            LicenseError::NotFound(code) => ApiError::NotFound(format!("license code not found: {code}")),
            LicenseError::Storage(e) => ApiError::Storage(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            success: false,
            code: self.error_code().to_string(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
