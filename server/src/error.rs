//! Error types for the server crate.
//!
//! - [`ServeError`]: failures of the background retrain job and of the
//!   serving coordinator, independent of HTTP.
//! - [`ApiError`]: what a handler returns; rendered as
//!   `{"detail": "...", "code": "..."}` with the matching status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use italiclas_data::EtlError;
use italiclas_learning::LearningError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message returned while no model is available.
pub const UNAVAILABLE_DETAIL: &str = "Data temporarily unavailable, retry later";

#[derive(Error, Debug)]
pub enum ServeError {
    /// The data source answered with a non-success status.
    #[error("Raw data source unavailable (HTTP {status})")]
    SourceUnavailable { status: u16 },

    #[error(transparent)]
    Etl(#[from] EtlError),

    #[error(transparent)]
    Learning(#[from] LearningError),

    /// A blocking task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl ServeError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            Self::Etl(err) => err.error_code(),
            Self::Learning(err) => err.error_code(),
            Self::Task(_) => "TASK_FAILED",
        }
    }

    pub fn is_artifact_not_found(&self) -> bool {
        match self {
            Self::Etl(err) => err.is_artifact_not_found(),
            Self::Learning(err) => err.is_artifact_not_found(),
            Self::SourceUnavailable { .. } | Self::Task(_) => false,
        }
    }
}

impl From<tokio::task::JoinError> for ServeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Errors returned by request handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No model yet; a retrain is running. The client should retry.
    #[error("Data temporarily unavailable, retry later")]
    Unavailable,

    /// The request body was malformed or failed validation.
    #[error("{0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Serve(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable => "DATA_UNAVAILABLE",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::Serve(err) => err.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!("[API] {}", self);
        }
        let body = ErrorBody {
            detail: self.to_string(),
            code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}
