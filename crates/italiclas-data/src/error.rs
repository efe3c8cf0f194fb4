//! Error types for the artifact store and the ETL stage.
//!
//! Two enums live here:
//!
//! - [`ArtifactError`] for anything that goes wrong while persisting or
//!   reading a cached artifact.
//! - [`EtlError`] for the fetch and clean steps, wrapping [`ArtifactError`]
//!   when a step reads or writes through the store.
//!
//! The serving layer only cares about one distinction: whether an artifact
//! is missing (see [`ArtifactError::is_not_found`]). Everything else is a
//! plain failure for whoever called the operation.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the [`ArtifactStore`](crate::ArtifactStore).
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// No file exists at the artifact path.
    #[error("Artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but was written by an incompatible format or schema.
    ///
    /// Treated like a missing artifact so that callers recompute it.
    #[error("Artifact {} is incompatible: {reason}", path.display())]
    Incompatible { path: PathBuf, reason: String },

    /// The file exists but its content cannot be decoded.
    #[error("Failed to deserialize artifact {}: {reason}", path.display())]
    Deserialization { path: PathBuf, reason: String },

    /// The value could not be encoded.
    #[error("Failed to serialize artifact: {0}")]
    Serialization(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    pub(crate) fn not_found(path: &Path) -> Self {
        Self::NotFound {
            path: path.to_path_buf(),
        }
    }

    /// Get error code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ARTIFACT_NOT_FOUND",
            Self::Incompatible { .. } => "ARTIFACT_INCOMPATIBLE",
            Self::Deserialization { .. } => "DESERIALIZATION_FAILED",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error means "there is no usable artifact at this path".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Incompatible { .. })
    }
}

/// Encoding failure reported by an [`Artifact`](crate::Artifact) codec.
///
/// The store attaches the path before surfacing it as an [`ArtifactError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(reason: impl ToString) -> Self {
        Self(reason.to_string())
    }
}

/// Columns that did not match an expected dataset schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Required columns that are absent.
    pub missing: Vec<String>,
    /// Columns present with the wrong type, as `(column, found dtype)`.
    pub mistyped: Vec<(String, String)>,
}

impl SchemaViolation {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.mistyped.is_empty()
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing columns [{}]", self.missing.join(", ")));
        }
        if !self.mistyped.is_empty() {
            let mistyped: Vec<String> = self
                .mistyped
                .iter()
                .map(|(column, dtype)| format!("{column}: {dtype}"))
                .collect();
            parts.push(format!("mistyped columns [{}]", mistyped.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// The main error type for the ETL stage.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A dataset does not have the required columns or column types.
    #[error("Invalid {dataset} data: {violation}")]
    SchemaInvalid {
        dataset: &'static str,
        violation: SchemaViolation,
    },

    /// The upstream data source did not answer within the timeout.
    #[error("Timed out after {timeout_secs}s fetching {url}")]
    UpstreamTimeout { url: String, timeout_secs: u64 },

    /// The downloaded archive does not contain the expected entry.
    #[error("Archive entry '{entry}' not found in download from {url}")]
    ArchiveEntryMissing { url: String, entry: String },

    /// The download is not a readable ZIP archive.
    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Reading or writing through the artifact store failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// HTTP request error.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    /// Get error code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaInvalid { .. } => "SCHEMA_INVALID",
            Self::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            Self::ArchiveEntryMissing { .. } => "ARCHIVE_ENTRY_MISSING",
            Self::Archive(_) => "ARCHIVE_INVALID",
            Self::Artifact(err) => err.error_code(),
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error is a missing (or stale) cached artifact.
    pub fn is_artifact_not_found(&self) -> bool {
        matches!(self, Self::Artifact(err) if err.is_not_found())
    }
}

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;
