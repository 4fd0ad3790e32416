//! API error handling.
//!
//! Every job failure is classified once, here, into a status code and a
//! stable error code.

use axum::{
    Json,
    extract::rejection::{BytesRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{Error, ErrorKind};

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 415 Unsupported Media Type error.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UNSUPPORTED_MEDIA_TYPE",
            message,
        )
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Create a 503 Service Unavailable error for a full admission gate.
    pub fn service_busy(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_BUSY", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match (err.kind(), err) {
            (ErrorKind::Busy, Error::Busy { active, max }) => ApiError::service_busy(message)
                .with_details(serde_json::json!({ "active": active, "max": max })),
            (ErrorKind::ClientInput, Error::UnsupportedMediaType(msg)) => {
                ApiError::unsupported_media_type(msg)
            }
            (ErrorKind::ClientInput, Error::Validation(msg)) => ApiError::bad_request(msg),
            (ErrorKind::ClientInput, _) => ApiError::bad_request(message),
            (
                ErrorKind::Stage,
                Error::StageFailed {
                    stage,
                    exit_code,
                    stderr,
                },
            ) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "STAGE_FAILED", message)
                .with_details(serde_json::json!({
                    "stage": stage,
                    "exit_code": exit_code,
                    "stderr": stderr,
                })),
            (ErrorKind::Stage, _) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "STAGE_FAILED", message)
            }
            (ErrorKind::Storage, _) => {
                tracing::error!("Storage error: {}", message);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message)
            }
            _ => {
                tracing::error!("Unexpected error: {}", message);
                ApiError::internal(message)
            }
        }
    }
}

impl ApiError {
    /// Re-express an extractor rejection in the JSON error body.
    fn from_rejection(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::PAYLOAD_TOO_LARGE => Self::new(status, "PAYLOAD_TOO_LARGE", message),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => Self::unsupported_media_type(message),
            _ => Self::bad_request(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
