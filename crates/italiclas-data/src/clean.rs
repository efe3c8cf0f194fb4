//! Raw CSV to [`CleanDataset`] transformation, cached through the store.

use crate::dataset::{CleanDataset, DatasetStats};
use crate::error::{EtlError, Result};
use crate::schema::{self, LANGUAGE_COLUMN, RAW_SCHEMA, TEXT_COLUMN};
use crate::store::ArtifactStore;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Language whose rows become positive labels by default.
pub const DEFAULT_TARGET_LANGUAGE: &str = "Italian";

/// Read a raw CSV file with a header row.
pub fn read_raw(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Turns raw labelled text into the clean `text`/`is_italian` dataset.
#[derive(Debug, Clone)]
pub struct Cleaner {
    store: ArtifactStore,
    target_language: String,
}

impl Cleaner {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }

    /// Label rows whose language equals `language` (exact match) as positive.
    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Return the clean dataset stored at `clean_path`, building it from the
    /// raw CSV at `raw_path` when it is missing, stale, or `force` is set.
    ///
    /// A cached file is decoded and its columns checked again before it is
    /// returned; a file written by another schema version is rebuilt.
    ///
    /// # Errors
    ///
    /// - [`EtlError::SchemaInvalid`] if the raw data lacks `text`/`language`
    /// - [`EtlError::Artifact`] if the cached file cannot be decoded
    /// - [`EtlError::Polars`] if the raw CSV cannot be parsed
    pub fn clean(&self, raw_path: &Path, clean_path: &Path, force: bool) -> Result<CleanDataset> {
        if !force && let Some(dataset) = self.store.load_cached::<CleanDataset>(clean_path)? {
            info!("[ETL] Load clean data from '{}'", clean_path.display());
            self.log_stats(&dataset.stats());
            return Ok(dataset);
        }

        let start = Instant::now();
        info!("[ETL] Cleaning data '{}'", raw_path.display());
        let raw = read_raw(raw_path)?;
        let dataset = self.transform(&raw)?;
        self.store.save(&dataset, clean_path)?;

        info!(
            "[ETL] Clean data stored to '{}' in {:.2?}",
            clean_path.display(),
            start.elapsed()
        );
        self.log_stats(&dataset.stats());
        Ok(dataset)
    }

    /// Project a raw frame onto the clean shape.
    ///
    /// Rows without text are dropped; a missing language is a negative.
    pub fn transform(&self, raw: &DataFrame) -> Result<CleanDataset> {
        schema::validate_schema(raw, RAW_SCHEMA).map_err(|violation| EtlError::SchemaInvalid {
            dataset: "raw",
            violation,
        })?;

        let (Some(text_col), Some(language_col)) = (
            schema::find_column(raw, TEXT_COLUMN),
            schema::find_column(raw, LANGUAGE_COLUMN),
        ) else {
            return Ok(CleanDataset::default());
        };

        let mut texts = Vec::with_capacity(raw.height());
        let mut labels = Vec::with_capacity(raw.height());
        let mut dropped = 0usize;
        for (text, language) in text_col.str()?.into_iter().zip(language_col.str()?) {
            match text {
                Some(text) => {
                    texts.push(text.to_string());
                    labels.push(language == Some(self.target_language.as_str()));
                }
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!("[ETL] Dropped {} rows without text", dropped);
        }

        CleanDataset::new(texts, labels)
    }

    fn log_stats(&self, stats: &DatasetStats) {
        info!(
            "[ETL] Total: {}; {}: {} ({:.2}%)",
            stats.rows,
            self.target_language,
            stats.positives,
            stats.positive_ratio * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transform_projects_language() {
        let raw = df![
            "Text" => ["ciao", "hello", "hallo", "buonasera"],
            "Language" => ["Italian", "English", "German", "Italian"],
        ]
        .unwrap();
        let dataset = Cleaner::new(ArtifactStore::default())
            .transform(&raw)
            .unwrap();
        assert_eq!(dataset.labels(), &[true, false, false, true]);
        assert_eq!(dataset.stats().positives, 2);
    }

    #[test]
    fn test_transform_drops_null_text() {
        let raw = df![
            "text" => [Some("ciao"), None, Some("hola")],
            "language" => [Some("Italian"), Some("Italian"), None],
        ]
        .unwrap();
        let dataset = Cleaner::new(ArtifactStore::default())
            .transform(&raw)
            .unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels(), &[true, false]);
    }

    #[test]
    fn test_transform_custom_target() {
        let raw = df![
            "text" => ["ciao", "hallo"],
            "language" => ["Italian", "German"],
        ]
        .unwrap();
        let dataset = Cleaner::new(ArtifactStore::default())
            .with_target_language("German")
            .transform(&raw)
            .unwrap();
        assert_eq!(dataset.labels(), &[false, true]);
    }

    #[test]
    fn test_transform_rejects_invalid_raw() {
        let raw = df![
            "text" => ["ciao"],
            "lang" => ["Italian"],
        ]
        .unwrap();
        let err = Cleaner::new(ArtifactStore::default())
            .transform(&raw)
            .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_INVALID");
        assert!(err.to_string().contains("language"));
    }
}
