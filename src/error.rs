//! Error types for the PDF Toolbox server
//!
//! Every failure a job can hit is folded into [`AppError`]. The status each
//! variant maps to lives in [`AppError::status_code`] and the only place that
//! writes an error body is the `IntoResponse` impl below.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::rasterizer::RasterizerError;
use crate::storage::StorageError;
use crate::transform::TransformError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Request body exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(#[source] StorageError),

    #[error("Storage read failed: {0}")]
    StorageRead(#[source] StorageError),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("Rasterizer failed: {0}")]
    Rasterizer(#[source] RasterizerError),

    #[error("Rasterizer timed out: {0}")]
    RasterizerTimeout(#[source] RasterizerError),

    #[error("Transform failed: {0}")]
    Transform(#[source] TransformError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Write { .. } => AppError::StorageWrite(err),
            StorageError::Read { .. } | StorageError::ObjectNotFound(_) => AppError::StorageRead(err),
            _ => AppError::Storage(err),
        }
    }
}

impl From<RasterizerError> for AppError {
    fn from(err: RasterizerError) -> Self {
        if err.is_timeout() {
            AppError::RasterizerTimeout(err)
        } else {
            AppError::Rasterizer(err)
        }
    }
}

impl From<TransformError> for AppError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Rasterizer(inner) => inner.into(),
            other => AppError::Transform(other),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Validation(format!("Malformed multipart body: {}", err.body_text()))
    }
}

impl AppError {
    /// The single error-to-status table.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::StorageWrite(_)
            | AppError::StorageRead(_)
            | AppError::Storage(_)
            | AppError::Rasterizer(_)
            | AppError::RasterizerTimeout(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Transform(e) if e.is_caller_error() => StatusCode::BAD_REQUEST,
            AppError::Transform(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to hand to an anonymous caller.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::PayloadTooLarge(_) | AppError::NotFound(_) | AppError::Forbidden(_) => {
                self.to_string()
            }
            AppError::StorageWrite(_) => "Failed to store document".to_string(),
            AppError::StorageRead(_) => "Failed to read staged document".to_string(),
            AppError::Storage(_) => "Storage error".to_string(),
            AppError::Rasterizer(_) => "Compression failed".to_string(),
            AppError::RasterizerTimeout(_) => "Compression timed out".to_string(),
            AppError::Transform(e) if e.is_caller_error() => e.to_string(),
            AppError::Transform(_) => "Document processing failed".to_string(),
            AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Diagnostic detail for debug builds. Rasterizer stderr never leaves the server.
    fn exception(&self) -> Option<String> {
        if !cfg!(debug_assertions) {
            return None;
        }
        match self {
            AppError::Validation(_)
            | AppError::PayloadTooLarge(_)
            | AppError::NotFound(_)
            | AppError::Forbidden(_)
            | AppError::Rasterizer(_)
            | AppError::RasterizerTimeout(_) => None,
            AppError::Transform(e) if e.is_caller_error() => None,
            other => Some(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "{}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Rejected request: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.public_message(),
            exception: self.exception(),
        });

        (status, body).into_response()
    }
}
