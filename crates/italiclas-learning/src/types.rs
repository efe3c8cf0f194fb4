//! Pipeline configuration values and the persisted hyperparameters.

use crate::metrics::Scoring;
use italiclas_data::{Artifact, CodecError, decode_bincode, encode_bincode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved key recording which metric selected the hyperparameters.
pub const SCORING_KEY: &str = "_scoring";

/// Accent normalization applied before tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StripAccents {
    /// Keep text as-is.
    #[default]
    None,
    /// Decompose, then drop every non-ASCII character.
    Ascii,
    /// Decompose, then drop combining marks.
    Unicode,
}

impl StripAccents {
    fn to_value(self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Ascii => json!("ascii"),
            Self::Unicode => json!("unicode"),
        }
    }
}

/// Unit the n-grams are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    /// Word n-grams over `\w\w+` tokens.
    #[default]
    Word,
    /// Character n-grams over the whole text.
    Char,
    /// Character n-grams inside word boundaries, words padded with a space.
    CharWb,
}

impl Analyzer {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Char => "char",
            Self::CharWb => "char_wb",
        }
    }
}

/// Settings of the n-gram count vectorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorizerParams {
    pub strip_accents: StripAccents,
    /// Inclusive `(min, max)` n-gram lengths.
    pub ngram_range: (usize, usize),
    pub analyzer: Analyzer,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            strip_accents: StripAccents::None,
            ngram_range: (1, 1),
            analyzer: Analyzer::Word,
        }
    }
}

/// Settings of the multinomial naive Bayes classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Additive smoothing.
    pub alpha: f64,
    /// Learn class priors from the data; `false` uses a uniform prior.
    pub fit_prior: bool,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_prior: true,
        }
    }
}

/// One complete pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineParams {
    pub vectorizer: VectorizerParams,
    pub classifier: ClassifierParams,
}

impl PipelineParams {
    /// Key/value view using the `vect__*` and `clf__*` names.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let v = &self.vectorizer;
        let c = &self.classifier;
        BTreeMap::from([
            ("vect__strip_accents".to_string(), v.strip_accents.to_value()),
            ("vect__ngram_range".to_string(), json!([v.ngram_range.0, v.ngram_range.1])),
            ("vect__analyzer".to_string(), json!(v.analyzer.name())),
            ("clf__alpha".to_string(), json!(c.alpha)),
            ("clf__fit_prior".to_string(), json!(c.fit_prior)),
        ])
    }
}

impl fmt::Display for PipelineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .to_map()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// The winning configuration of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub params: PipelineParams,
    /// Metric that selected `params`.
    pub scoring: Scoring,
    /// Mean cross-validation score of `params` under `scoring`.
    pub best_score: f64,
}

impl Hyperparameters {
    /// Key/value view of the parameters plus the reserved [`SCORING_KEY`].
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = self.params.to_map();
        map.insert(SCORING_KEY.to_string(), json!(self.scoring.name()));
        map
    }
}

impl Artifact for Hyperparameters {
    const KIND: &'static str = "hyperparameters";
    const SCHEMA_VERSION: u16 = 1;

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        encode_bincode(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        decode_bincode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_params() {
        let params = PipelineParams::default();
        assert_eq!(params.vectorizer.ngram_range, (1, 1));
        assert_eq!(params.vectorizer.analyzer, Analyzer::Word);
        assert_eq!(params.vectorizer.strip_accents, StripAccents::None);
        assert_eq!(params.classifier.alpha, 1.0);
        assert!(params.classifier.fit_prior);
    }

    #[test]
    fn test_hyperparameters_map_keys() {
        let hyper = Hyperparameters {
            params: PipelineParams {
                vectorizer: VectorizerParams {
                    strip_accents: StripAccents::Unicode,
                    ngram_range: (1, 3),
                    analyzer: Analyzer::CharWb,
                },
                classifier: ClassifierParams {
                    alpha: 0.1,
                    fit_prior: false,
                },
            },
            scoring: Scoring::F1,
            best_score: 0.97,
        };
        let map = hyper.to_map();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "_scoring",
                "clf__alpha",
                "clf__fit_prior",
                "vect__analyzer",
                "vect__ngram_range",
                "vect__strip_accents",
            ]
        );
        assert_eq!(map["_scoring"], json!("f1"));
        assert_eq!(map["vect__ngram_range"], json!([1, 3]));
        assert_eq!(map["vect__analyzer"], json!("char_wb"));
    }

    #[test]
    fn test_no_accent_stripping_is_null() {
        let map = PipelineParams::default().to_map();
        assert_eq!(map["vect__strip_accents"], Value::Null);
        assert!(PipelineParams::default().to_string().contains("vect__analyzer=\"word\""));
    }

    #[test]
    fn test_hyperparameters_codec() {
        let hyper = Hyperparameters {
            params: PipelineParams::default(),
            scoring: Scoring::RocAuc,
            best_score: 0.5,
        };
        let decoded = Hyperparameters::decode(&hyper.encode().unwrap()).unwrap();
        assert_eq!(decoded, hyper);
    }
}
