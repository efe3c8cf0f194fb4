//! Bag-of-n-grams count vectorizer.
//!
//! Text goes through three steps before counting:
//!
//! 1. lowercase
//! 2. accent stripping, per [`StripAccents`]
//! 3. analysis into n-grams, per [`Analyzer`] and the n-gram range
//!
//! The vocabulary is every n-gram seen during [`CountVectorizer::fit`],
//! indexed in sorted order so that two fits on the same data give the same
//! feature indices. Unknown n-grams are ignored at transform time.

use crate::error::{LearningError, Result};
use crate::types::{Analyzer, StripAccents, VectorizerParams};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("Invalid regex: word token"));

static MULTI_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s\s+").expect("Invalid regex: whitespace run"));

/// Sparse document vector: `(feature index, count)` pairs sorted by index.
pub type SparseRow = Vec<(usize, u32)>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountVectorizer {
    params: VectorizerParams,
    vocabulary: HashMap<String, usize>,
}

impl CountVectorizer {
    pub fn new(params: VectorizerParams) -> Self {
        Self {
            params,
            vocabulary: HashMap::new(),
        }
    }

    pub fn params(&self) -> &VectorizerParams {
        &self.params
    }

    /// Number of features learned by the last fit.
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    /// Index of `feature` in the vocabulary.
    pub fn feature_index(&self, feature: &str) -> Option<usize> {
        self.vocabulary.get(feature).copied()
    }

    /// Split one document into its n-gram features.
    pub fn analyze(&self, doc: &str) -> Vec<String> {
        let doc = self.preprocess(doc);
        let (min_n, max_n) = self.params.ngram_range;
        match self.params.analyzer {
            Analyzer::Word => word_ngrams(&doc, min_n, max_n),
            Analyzer::Char => char_ngrams(&doc, min_n, max_n),
            Analyzer::CharWb => char_wb_ngrams(&doc, min_n, max_n),
        }
    }

    /// Learn the vocabulary and return the count vectors of `docs`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidConfig`] if the n-gram range is invalid
    /// - [`LearningError::InvalidData`] if no document yields a feature
    pub fn fit_transform<S: AsRef<str>>(&mut self, docs: &[S]) -> Result<Vec<SparseRow>> {
        let (min_n, max_n) = self.params.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(LearningError::InvalidConfig(format!(
                "ngram_range ({min_n}, {max_n}) must satisfy 1 <= min <= max"
            )));
        }

        let analyzed: Vec<Vec<String>> = docs.iter().map(|doc| self.analyze(doc.as_ref())).collect();
        let features: BTreeSet<&String> = analyzed.iter().flatten().collect();
        if features.is_empty() {
            return Err(LearningError::InvalidData(
                "empty vocabulary; the documents contain no tokens".to_string(),
            ));
        }
        self.vocabulary = features
            .into_iter()
            .enumerate()
            .map(|(idx, feature)| (feature.clone(), idx))
            .collect();

        Ok(analyzed.iter().map(|features| self.count(features)).collect())
    }

    /// Learn the vocabulary from `docs`.
    pub fn fit<S: AsRef<str>>(&mut self, docs: &[S]) -> Result<()> {
        self.fit_transform(docs).map(|_| ())
    }

    /// Count vectors of `docs` against the learned vocabulary.
    pub fn transform<S: AsRef<str>>(&self, docs: &[S]) -> Vec<SparseRow> {
        docs.iter()
            .map(|doc| self.count(&self.analyze(doc.as_ref())))
            .collect()
    }

    fn count(&self, features: &[String]) -> SparseRow {
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for feature in features {
            if let Some(&idx) = self.vocabulary.get(feature) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }
        let mut row: SparseRow = counts.into_iter().collect();
        row.sort_unstable_by_key(|&(idx, _)| idx);
        row
    }

    fn preprocess(&self, doc: &str) -> String {
        let lower = doc.to_lowercase();
        strip_accents(&lower, self.params.strip_accents)
    }
}

/// Apply accent stripping to already-lowercased text.
pub fn strip_accents(text: &str, mode: StripAccents) -> String {
    match mode {
        StripAccents::None => text.to_string(),
        StripAccents::Unicode => text.nfkd().filter(|&c| !is_combining_mark(c)).collect(),
        StripAccents::Ascii => text.nfkd().filter(char::is_ascii).collect(),
    }
}

fn word_ngrams(doc: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let tokens: Vec<&str> = WORD_PATTERN.find_iter(doc).map(|m| m.as_str()).collect();
    let mut ngrams = Vec::new();
    let mut from = min_n;
    if min_n == 1 {
        ngrams.extend(tokens.iter().map(|t| t.to_string()));
        from = 2;
    }
    for n in from..=max_n.min(tokens.len()) {
        ngrams.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    ngrams
}

fn char_ngrams(doc: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let text = MULTI_WHITESPACE.replace_all(doc, " ");
    let chars: Vec<char> = text.chars().collect();
    let mut ngrams = Vec::new();
    for n in min_n..=max_n.min(chars.len()) {
        ngrams.extend(chars.windows(n).map(|window| window.iter().collect::<String>()));
    }
    ngrams
}

fn char_wb_ngrams(doc: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let text = MULTI_WHITESPACE.replace_all(doc, " ");
    let mut ngrams = Vec::new();
    for word in text.split_whitespace() {
        let padded: Vec<char> = std::iter::once(' ')
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        for n in min_n..=max_n {
            if padded.len() <= n {
                // A short word is counted once, whole
                ngrams.push(padded.iter().collect());
                break;
            }
            ngrams.extend(padded.windows(n).map(|window| window.iter().collect::<String>()));
        }
    }
    ngrams
}
