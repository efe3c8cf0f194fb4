//! Configuration for the optimizer and the trainer.
//!
//! Both configs are built through validating builders:
//!
//! ```rust,ignore
//! use italiclas_learning::{OptimizerConfig, Scoring, SearchStrategy, TrainerConfig};
//!
//! let optimizer = OptimizerConfig::builder()
//!     .scoring(Scoring::RocAuc)
//!     .cv_folds(5)
//!     .strategy(SearchStrategy::SuccessiveHalving)
//!     .build()?;
//!
//! let trainer = TrainerConfig::builder()
//!     .optimizer(optimizer)
//!     .score_folds(3)
//!     .build()?;
//! ```

use crate::error::{LearningError, Result};
use crate::metrics::Scoring;
use crate::types::{Analyzer, ClassifierParams, PipelineParams, StripAccents, VectorizerParams};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CV_FOLDS: usize = 5;
pub const DEFAULT_SCORE_FOLDS: usize = 3;
pub const DEFAULT_HALVING_FACTOR: usize = 3;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Longest n-gram in the default search space.
const MAX_NGRAM: usize = 5;

/// How the optimizer walks the search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Score every candidate on the full dataset.
    Exhaustive,
    /// Score all candidates on a small sample, keep the best third on a
    /// three times larger sample, and so on up to the full dataset.
    #[default]
    SuccessiveHalving,
}

/// Discrete grid of pipeline configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub strip_accents: Vec<StripAccents>,
    pub ngram_ranges: Vec<(usize, usize)>,
    pub analyzers: Vec<Analyzer>,
    pub alphas: Vec<f64>,
    pub fit_priors: Vec<bool>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        let ngram_ranges = (1..=MAX_NGRAM)
            .flat_map(|a| (a + 1..=MAX_NGRAM).map(move |b| (a, b)))
            .collect();
        Self {
            strip_accents: vec![StripAccents::Ascii, StripAccents::Unicode, StripAccents::None],
            ngram_ranges,
            analyzers: vec![Analyzer::Word, Analyzer::Char, Analyzer::CharWb],
            alphas: vec![0.1, 0.5, 1.0],
            fit_priors: vec![true, false],
        }
    }
}

impl SearchSpace {
    /// A space holding exactly one configuration.
    pub fn single(params: PipelineParams) -> Self {
        Self {
            strip_accents: vec![params.vectorizer.strip_accents],
            ngram_ranges: vec![params.vectorizer.ngram_range],
            analyzers: vec![params.vectorizer.analyzer],
            alphas: vec![params.classifier.alpha],
            fit_priors: vec![params.classifier.fit_prior],
        }
    }

    pub fn len(&self) -> usize {
        self.strip_accents.len()
            * self.ngram_ranges.len()
            * self.analyzers.len()
            * self.alphas.len()
            * self.fit_priors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every configuration, ordered by key name (`clf__alpha` outermost,
    /// `vect__strip_accents` innermost).
    pub fn candidates(&self) -> Vec<PipelineParams> {
        let mut out = Vec::with_capacity(self.len());
        for &alpha in &self.alphas {
            for &fit_prior in &self.fit_priors {
                for &analyzer in &self.analyzers {
                    for &ngram_range in &self.ngram_ranges {
                        for &strip_accents in &self.strip_accents {
                            out.push(PipelineParams {
                                vectorizer: VectorizerParams {
                                    strip_accents,
                                    ngram_range,
                                    analyzer,
                                },
                                classifier: ClassifierParams { alpha, fit_prior },
                            });
                        }
                    }
                }
            }
        }
        out
    }

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(LearningError::InvalidConfig(
                "search_space must contain at least one value per parameter".to_string(),
            ));
        }
        if let Some(&(a, b)) = self.ngram_ranges.iter().find(|&&(a, b)| a == 0 || a > b) {
            return Err(LearningError::InvalidConfig(format!(
                "search_space ngram_range ({a}, {b}) must satisfy 1 <= min <= max"
            )));
        }
        if let Some(alpha) = self.alphas.iter().find(|a| !a.is_finite() || **a < 0.0) {
            return Err(LearningError::InvalidConfig(format!(
                "search_space alpha must be non-negative, got {alpha}"
            )));
        }
        Ok(())
    }
}

/// Configuration of the hyperparameter search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Metric to maximize (default: f1).
    pub scoring: Scoring,
    /// Cross-validation folds per candidate (default: 5).
    pub cv_folds: usize,
    pub strategy: SearchStrategy,
    /// Growth of the sample and shrink of the candidate set per halving round (default: 3).
    pub halving_factor: usize,
    /// Seed for halving subsamples (default: 42).
    pub random_seed: u64,
    pub search_space: SearchSpace,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            scoring: Scoring::F1,
            cv_folds: DEFAULT_CV_FOLDS,
            strategy: SearchStrategy::SuccessiveHalving,
            halving_factor: DEFAULT_HALVING_FACTOR,
            random_seed: DEFAULT_RANDOM_SEED,
            search_space: SearchSpace::default(),
        }
    }
}

impl OptimizerConfig {
    #[must_use]
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder::default()
    }
}

/// Builder for [`OptimizerConfig`].
#[derive(Debug, Clone, Default)]
pub struct OptimizerConfigBuilder {
    config: OptimizerConfig,
}

impl OptimizerConfigBuilder {
    #[must_use]
    pub fn scoring(mut self, scoring: Scoring) -> Self {
        self.config.scoring = scoring;
        self
    }

    /// Set the number of cross-validation folds.
    ///
    /// [`build()`](Self::build) fails if `folds < 2`.
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: SearchStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// [`build()`](Self::build) fails if `factor < 2`.
    #[must_use]
    pub fn halving_factor(mut self, factor: usize) -> Self {
        self.config.halving_factor = factor;
        self
    }

    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    #[must_use]
    pub fn search_space(mut self, space: SearchSpace) -> Self {
        self.config.search_space = space;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if:
    /// - `cv_folds` is less than 2
    /// - `halving_factor` is less than 2
    /// - the search space is empty or holds an invalid value
    pub fn build(self) -> Result<OptimizerConfig> {
        if self.config.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }
        if self.config.halving_factor < 2 {
            return Err(LearningError::InvalidConfig(
                "halving_factor must be at least 2".to_string(),
            ));
        }
        self.config.search_space.validate()?;
        Ok(self.config)
    }
}

/// Configuration of the trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Folds used when reporting scores after training (default: 3).
    pub score_folds: usize,
    /// Settings for the hyperparameter search run on a cache miss.
    pub optimizer: OptimizerConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            score_folds: DEFAULT_SCORE_FOLDS,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl TrainerConfig {
    #[must_use]
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Clone, Default)]
pub struct TrainerConfigBuilder {
    config: TrainerConfig,
}

impl TrainerConfigBuilder {
    /// [`build()`](Self::build) fails if `folds < 2`.
    #[must_use]
    pub fn score_folds(mut self, folds: usize) -> Self {
        self.config.score_folds = folds;
        self
    }

    #[must_use]
    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.config.optimizer = optimizer;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if `score_folds` is less than 2.
    pub fn build(self) -> Result<TrainerConfig> {
        if self.config.score_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "score_folds must be at least 2".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_search_space() {
        let space = SearchSpace::default();
        assert_eq!(
            space.ngram_ranges,
            vec![(1, 2), (1, 3), (1, 4), (1, 5), (2, 3), (2, 4), (2, 5), (3, 4), (3, 5), (4, 5)]
        );
        assert_eq!(space.len(), 540);
        assert_eq!(space.candidates().len(), 540);
    }

    #[test]
    fn test_candidate_order() {
        let candidates = SearchSpace::default().candidates();
        // Innermost key varies fastest
        assert_eq!(candidates[0].vectorizer.strip_accents, StripAccents::Ascii);
        assert_eq!(candidates[1].vectorizer.strip_accents, StripAccents::Unicode);
        assert_eq!(candidates[3].vectorizer.ngram_range, (1, 3));
        assert_eq!(candidates[0].classifier.alpha, 0.1);
        assert_eq!(candidates[539].classifier.alpha, 1.0);
        assert!(!candidates[539].classifier.fit_prior);
    }

    #[test]
    fn test_single_space() {
        let space = SearchSpace::single(PipelineParams::default());
        assert_eq!(space.candidates(), vec![PipelineParams::default()]);
    }

    #[test]
    fn test_optimizer_defaults() {
        let config = OptimizerConfig::builder().build().unwrap();
        assert_eq!(config.scoring, Scoring::F1);
        assert_eq!(config.cv_folds, DEFAULT_CV_FOLDS);
        assert_eq!(config.halving_factor, 3);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.strategy, SearchStrategy::SuccessiveHalving);
    }

    #[test]
    fn test_invalid_cv_folds() {
        let err = OptimizerConfig::builder().cv_folds(1).build().unwrap_err();
        assert!(err.to_string().contains("cv_folds"));
    }

    #[test]
    fn test_invalid_halving_factor() {
        let err = OptimizerConfig::builder()
            .halving_factor(1)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("halving_factor"));
    }

    #[test]
    fn test_invalid_search_space() {
        let mut space = SearchSpace::default();
        space.ngram_ranges.push((3, 2));
        let err = OptimizerConfig::builder()
            .search_space(space)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ngram_range"));

        let mut space = SearchSpace::default();
        space.analyzers.clear();
        assert!(OptimizerConfig::builder().search_space(space).build().is_err());
    }

    #[test]
    fn test_trainer_config() {
        let config = TrainerConfig::builder().build().unwrap();
        assert_eq!(config.score_folds, DEFAULT_SCORE_FOLDS);
        assert!(TrainerConfig::builder().score_folds(1).build().is_err());
    }
}
