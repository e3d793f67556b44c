//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use silo_storage::StorageError;
use std::time::Duration;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Request field the error refers to, for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Offending value, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A request field is present but unacceptable.
    #[error("invalid {field}: {message}")]
    Invalid {
        field: String,
        value: Option<String>,
        message: String,
    },

    /// A required request field is absent.
    #[error("missing {field}")]
    Missing { field: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("push did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Build an [`ApiError::Invalid`].
    pub fn invalid(
        field: impl Into<String>,
        value: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            field: field.into(),
            value: value.map(str::to_owned),
            message: message.into(),
        }
    }

    /// Build an [`ApiError::Missing`].
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "invalid",
            Self::Missing { .. } => "missing",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
            Self::Storage(_) => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Invalid { .. } | Self::Missing { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::UploadNotFound(_)
                | StorageError::InvalidPart(_)
                | StorageError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                StorageError::Io(_) | StorageError::S3(_) | StorageError::Presign(_) => {
                    StatusCode::BAD_GATEWAY
                }
                StorageError::InvalidKey(_) | StorageError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } | Self::Missing { field } => Some(field),
            _ => None,
        }
    }

    fn value(&self) -> Option<&str> {
        match self {
            Self::Invalid { value, .. } => value.as_deref(),
            _ => None,
        }
    }
}

impl From<silo_core::Error> for ApiError {
    fn from(err: silo_core::Error) -> Self {
        match err {
            silo_core::Error::InvalidReference(message) => Self::invalid("ref", None, message),
            silo_core::Error::InvalidDigest(message) => Self::invalid("digest", None, message),
            silo_core::Error::InvalidLayer {
                index,
                digest,
                reason,
            } => Self::invalid(
                format!("manifest.layers[{index}].digest"),
                Some(&digest),
                reason,
            ),
            silo_core::Error::Config(message) => Self::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }

        // Server-side details stay in the log.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            code: self.code().to_string(),
            message,
            field: self.field().map(str::to_owned),
            value: self.value().map(str::to_owned),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
