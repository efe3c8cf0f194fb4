//! italiclas-data: artifact persistence and the ETL stage.
//!
//! This crate owns everything that lives on disk before a model exists:
//! the generic [`ArtifactStore`], the raw data [`Fetcher`] and the
//! [`Cleaner`] that turns the raw CSV into a [`CleanDataset`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use italiclas_data::{ArtifactStore, Cleaner, Fetcher, DEFAULT_ENTRY_NAME, DEFAULT_SOURCE_URL};
//! use std::path::Path;
//!
//! let raw = Path::new("artifacts/data/raw_data.csv");
//! let clean = Path::new("artifacts/data/clean_data.bin");
//!
//! let fetcher = Fetcher::new(DEFAULT_ENTRY_NAME)?;
//! if fetcher.fetch(DEFAULT_SOURCE_URL, raw, false)?.is_available() {
//!     let dataset = Cleaner::new(ArtifactStore::default()).clean(raw, clean, false)?;
//!     println!("{} rows", dataset.len());
//! }
//! ```
//!
//! # Caching
//!
//! Every step follows the same rule: if its output file exists and the
//! caller did not pass `force`, the file is reused. Nothing checks whether
//! the inputs changed since, so delete the output (or force) after
//! replacing upstream data.
//!
//! ```text
//!  source URL ──fetch──► raw_data.csv ──clean──► clean_data.bin ──► training
//! ```
//!
//! # Error Handling
//!
//! Store operations return [`ArtifactError`]; fetch and clean return
//! [`EtlError`]. Use [`ArtifactError::is_not_found`] or
//! [`EtlError::is_artifact_not_found`] to detect a missing artifact.

mod clean;
mod dataset;
mod error;
mod fetch;
pub mod schema;
mod store;

// Re-export public API
//
// Store
pub use store::{Artifact, ArtifactStore, Compression, decode_bincode, encode_bincode};
// Error types
pub use error::{ArtifactError, CodecError, EtlError, Result, SchemaViolation};
// Datasets
pub use dataset::{CleanDataset, DatasetStats};
pub use schema::{ColumnKind, is_valid_clean, is_valid_raw, validate_schema};
// ETL steps
pub use clean::{Cleaner, DEFAULT_TARGET_LANGUAGE, read_raw};
pub use fetch::{DEFAULT_ENTRY_NAME, DEFAULT_SOURCE_URL, DEFAULT_TIMEOUT_SECS, FetchOutcome, Fetcher};
