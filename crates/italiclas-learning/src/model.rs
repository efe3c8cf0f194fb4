//! The fitted vectorizer + classifier pair that gets persisted and served.

use crate::bayes::MultinomialNb;
use crate::error::{LearningError, Result};
use crate::text::CountVectorizer;
use crate::types::PipelineParams;
use italiclas_data::{Artifact, CodecError, decode_bincode, encode_bincode};
use serde::{Deserialize, Serialize};

/// A trained text classifier.
///
/// Built with [`FittedPipeline::fit`]; there is no unfitted state, so every
/// value can predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    params: PipelineParams,
    vectorizer: CountVectorizer,
    classifier: MultinomialNb,
}

impl FittedPipeline {
    /// Fit a pipeline configured by `params` on labelled texts.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidData`] if sizes differ, a class is missing
    ///   or the texts yield no features
    /// - [`LearningError::InvalidConfig`] if `params` are out of range
    pub fn fit<S: AsRef<str>>(params: PipelineParams, texts: &[S], labels: &[bool]) -> Result<Self> {
        if texts.len() != labels.len() {
            return Err(LearningError::InvalidData(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        let mut vectorizer = CountVectorizer::new(params.vectorizer);
        let rows = vectorizer.fit_transform(texts)?;
        let classifier = MultinomialNb::fit(params.classifier, &rows, labels, vectorizer.n_features())?;
        Ok(Self {
            params,
            vectorizer,
            classifier,
        })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.vectorizer.n_features()
    }

    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Vec<bool> {
        self.vectorizer
            .transform(texts)
            .iter()
            .map(|row| self.classifier.predict(row))
            .collect()
    }

    /// Probability that each text is positive.
    pub fn predict_proba<S: AsRef<str>>(&self, texts: &[S]) -> Vec<f64> {
        self.vectorizer
            .transform(texts)
            .iter()
            .map(|row| self.classifier.predict_proba(row))
            .collect()
    }

    pub fn predict_one(&self, text: &str) -> bool {
        self.predict(&[text]).first().copied().unwrap_or(false)
    }
}

impl Artifact for FittedPipeline {
    const KIND: &'static str = "ML model pipeline";
    const SCHEMA_VERSION: u16 = 1;

    fn encode(&self) -> std::result::Result<Vec<u8>, CodecError> {
        encode_bincode(self)
    }

    fn decode(bytes: &[u8]) -> std::result::Result<Self, CodecError> {
        decode_bincode(bytes)
    }
}
