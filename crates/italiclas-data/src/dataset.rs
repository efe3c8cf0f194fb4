//! The clean two-column dataset consumed by training.

use crate::error::{CodecError, EtlError, Result};
use crate::schema::{self, CLEAN_SCHEMA, IS_ITALIAN_COLUMN, TEXT_COLUMN};
use crate::store::Artifact;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Labelled texts: `texts[i]` is Italian iff `is_italian[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanDataset {
    texts: Vec<String>,
    is_italian: Vec<bool>,
}

/// Row counts reported whenever a clean dataset is produced or loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub rows: usize,
    pub positives: usize,
    /// Share of positive rows in `[0, 1]`; zero for an empty dataset.
    pub positive_ratio: f64,
}

impl CleanDataset {
    /// Build from parallel vectors.
    ///
    /// # Errors
    ///
    /// [`EtlError::Polars`] with a shape error if the lengths differ.
    pub fn new(texts: Vec<String>, is_italian: Vec<bool>) -> Result<Self> {
        if texts.len() != is_italian.len() {
            return Err(EtlError::Polars(PolarsError::ShapeMismatch(
                format!(
                    "{} texts but {} labels",
                    texts.len(),
                    is_italian.len()
                )
                .into(),
            )));
        }
        Ok(Self { texts, is_italian })
    }

    /// Extract a clean dataset from a frame, validating its schema first.
    ///
    /// Rows with a null text are skipped; a null label is read as `false`.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        schema::validate_schema(df, CLEAN_SCHEMA).map_err(|violation| EtlError::SchemaInvalid {
            dataset: "clean",
            violation,
        })?;

        // Both lookups succeed after validation
        let (Some(text_col), Some(label_col)) = (
            schema::find_column(df, TEXT_COLUMN),
            schema::find_column(df, IS_ITALIAN_COLUMN),
        ) else {
            return Ok(Self::default());
        };

        let mut texts = Vec::with_capacity(df.height());
        let mut is_italian = Vec::with_capacity(df.height());
        for (text, label) in text_col.str()?.into_iter().zip(label_col.bool()?) {
            if let Some(text) = text {
                texts.push(text.to_string());
                is_italian.push(label.unwrap_or(false));
            }
        }
        Ok(Self { texts, is_italian })
    }

    /// Convert back to a `text`/`is_italian` frame.
    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df![
            TEXT_COLUMN => self.texts.as_slice(),
            IS_ITALIAN_COLUMN => self.is_italian.as_slice(),
        ]?)
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn labels(&self) -> &[bool] {
        &self.is_italian
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn stats(&self) -> DatasetStats {
        let rows = self.len();
        let positives = self.is_italian.iter().filter(|&&label| label).count();
        let positive_ratio = if rows == 0 {
            0.0
        } else {
            positives as f64 / rows as f64
        };
        DatasetStats {
            rows,
            positives,
            positive_ratio,
        }
    }
}

impl Artifact for CleanDataset {
    const KIND: &'static str = "clean dataset";
    const SCHEMA_VERSION: u16 = 1;

    fn encode(&self) -> std::result::Result<Vec<u8>, CodecError> {
        let mut df = self.to_frame().map_err(CodecError::new)?;
        let mut buf = Vec::new();
        IpcWriter::new(&mut buf)
            .finish(&mut df)
            .map_err(CodecError::new)?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> std::result::Result<Self, CodecError> {
        let df = IpcReader::new(Cursor::new(bytes))
            .finish()
            .map_err(CodecError::new)?;
        Self::from_frame(&df).map_err(CodecError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> CleanDataset {
        CleanDataset::new(
            vec![
                "ciao a tutti".to_string(),
                "good morning".to_string(),
                "buongiorno".to_string(),
                "guten tag".to_string(),
            ],
            vec![true, false, true, false],
        )
        .unwrap()
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.positives, 2);
        assert!((stats.positive_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_empty_dataset() {
        let stats = CleanDataset::default().stats();
        assert_eq!(stats.rows, 0);
        assert_eq!(stats.positive_ratio, 0.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = CleanDataset::new(vec!["a".to_string()], vec![]).unwrap_err();
        assert_eq!(err.error_code(), "POLARS_ERROR");
    }

    #[test]
    fn test_frame_round_trip() {
        let dataset = sample();
        let df = dataset.to_frame().unwrap();
        assert!(schema::is_valid_clean(&df));
        assert_eq!(CleanDataset::from_frame(&df).unwrap(), dataset);
    }

    #[test]
    fn test_from_frame_rejects_raw_shape() {
        let df = df![
            "text" => ["ciao"],
            "language" => ["Italian"],
        ]
        .unwrap();
        let err = CleanDataset::from_frame(&df).unwrap_err();
        assert!(matches!(err, EtlError::SchemaInvalid { dataset: "clean", .. }));
    }

    #[test]
    fn test_from_frame_skips_null_text() {
        let df = df![
            "Text" => [Some("ciao"), None, Some("hello")],
            "Is_Italian" => [Some(true), Some(true), None],
        ]
        .unwrap();
        let dataset = CleanDataset::from_frame(&df).unwrap();
        assert_eq!(dataset.texts(), &["ciao".to_string(), "hello".to_string()]);
        assert_eq!(dataset.labels(), &[true, false]);
    }

    #[test]
    fn test_ipc_codec() {
        let dataset = sample();
        let bytes = dataset.encode().unwrap();
        assert_eq!(CleanDataset::decode(&bytes).unwrap(), dataset);
        assert!(CleanDataset::decode(b"not arrow").is_err());
    }
}
