//! Column checks for the raw and clean datasets.
//!
//! Column names are matched case-insensitively (the upstream CSV ships
//! `Text`/`Language`), dtypes are matched exactly.

use crate::error::SchemaViolation;
use polars::prelude::*;

pub const TEXT_COLUMN: &str = "text";
pub const LANGUAGE_COLUMN: &str = "language";
pub const IS_ITALIAN_COLUMN: &str = "is_italian";

/// Expected column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Boolean,
}

impl ColumnKind {
    fn matches(self, dtype: &DataType) -> bool {
        match self {
            Self::Text => dtype == &DataType::String,
            Self::Boolean => dtype == &DataType::Boolean,
        }
    }
}

/// Raw dataset: a text column and a language label column, both strings.
pub const RAW_SCHEMA: &[(&str, ColumnKind)] = &[
    (TEXT_COLUMN, ColumnKind::Text),
    (LANGUAGE_COLUMN, ColumnKind::Text),
];

/// Clean dataset: a text column and the boolean label.
pub const CLEAN_SCHEMA: &[(&str, ColumnKind)] = &[
    (TEXT_COLUMN, ColumnKind::Text),
    (IS_ITALIAN_COLUMN, ColumnKind::Boolean),
];

/// Find a column by case-insensitive name.
pub fn find_column<'a>(df: &'a DataFrame, name: &str) -> Option<&'a Column> {
    df.get_columns()
        .iter()
        .find(|col| col.name().as_str().eq_ignore_ascii_case(name))
}

/// Check `df` against an expected schema, collecting every problem.
///
/// Extra columns are ignored.
pub fn validate_schema(df: &DataFrame, expected: &[(&str, ColumnKind)]) -> Result<(), SchemaViolation> {
    let mut violation = SchemaViolation::default();

    for &(name, kind) in expected {
        match find_column(df, name) {
            None => violation.missing.push(name.to_string()),
            Some(col) if !kind.matches(col.dtype()) => {
                violation
                    .mistyped
                    .push((name.to_string(), col.dtype().to_string()));
            }
            Some(_) => {}
        }
    }

    if violation.is_empty() {
        Ok(())
    } else {
        Err(violation)
    }
}

/// Whether `df` is usable as raw data.
pub fn is_valid_raw(df: &DataFrame) -> bool {
    validate_schema(df, RAW_SCHEMA).is_ok()
}

/// Whether `df` is usable as clean data.
pub fn is_valid_clean(df: &DataFrame) -> bool {
    validate_schema(df, CLEAN_SCHEMA).is_ok()
}
