//! Error types for the italiclas-learning crate.
//!
//! [`LearningError`] is returned by every fallible operation in the crate.
//! Errors from the data crate are wrapped rather than flattened so that the
//! serving layer can still ask the one question it cares about: is the
//! artifact missing? See [`LearningError::is_artifact_not_found`].

use italiclas_data::{ArtifactError, EtlError};
use thiserror::Error;

/// The main error type for italiclas-learning operations.
#[derive(Error, Debug)]
pub enum LearningError {
    /// Invalid configuration provided to the optimizer or trainer.
    ///
    /// The message names the offending field and the accepted values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Training data cannot be used as given.
    ///
    /// Common causes:
    /// - Fewer samples of a class than cross-validation folds
    /// - Only one class present
    /// - The vectorizer produced an empty vocabulary
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A scoring name that is not part of [`Scoring`](crate::Scoring).
    #[error("Unknown scoring '{name}', expected one of: {supported}")]
    UnknownScoring { name: String, supported: String },

    /// Reading or writing a cached artifact failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Loading the clean dataset failed.
    #[error(transparent)]
    Etl(#[from] EtlError),
}

impl LearningError {
    /// Get error code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::UnknownScoring { .. } => "UNKNOWN_SCORING",
            Self::Artifact(err) => err.error_code(),
            Self::Etl(err) => err.error_code(),
        }
    }

    /// Check if this error is a missing (or stale) cached artifact.
    ///
    /// This is the signal the serving layer turns into a retrain.
    pub fn is_artifact_not_found(&self) -> bool {
        match self {
            Self::Artifact(err) => err.is_not_found(),
            Self::Etl(err) => err.is_artifact_not_found(),
            _ => false,
        }
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;
