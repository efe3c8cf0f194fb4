//! italiclas-learning: train and serve a language classifier for short texts.
//!
//! This crate turns the clean dataset produced by `italiclas-data` into a
//! fitted text classification pipeline (bag of n-grams + multinomial naive
//! Bayes), picks its configuration by cross-validated search, and answers
//! single-text predictions from a shared in-memory cache.
//!
//! # Features
//!
//! - **Vectorizer**: word, char and char_wb n-grams with optional accent stripping
//! - **Classifier**: multinomial naive Bayes with additive smoothing
//! - **Hyperparameter Search**: exhaustive or successive halving over a discrete grid
//! - **Scoring**: closed set of metrics, parsed from their snake_case names
//! - **Caching**: every stage reuses its artifact unless forced
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use italiclas_data::ArtifactStore;
//! use italiclas_learning::{Predictor, TrainOptions, Trainer, TrainerConfig};
//! use std::path::Path;
//!
//! let store = ArtifactStore::default();
//! let data = Path::new("artifacts/data/clean_data.bin");
//! let pipeline = Path::new("artifacts/ml/model_pipeline.bin");
//! let params = Path::new("artifacts/ml/optim_params.bin");
//!
//! // Search hyperparameters if needed, fit on the whole dataset, save
//! let trainer = Trainer::new(store, TrainerConfig::builder().build()?);
//! trainer.train(data, pipeline, params, TrainOptions::default())?;
//!
//! // Later, possibly in another process
//! let predictor = Predictor::new(store);
//! assert!(predictor.predict("ciao mondo", pipeline)?);
//! ```
//!
//! # Architecture
//!
//! ```text
//!  clean_data.bin ──► Optimizer ──► optim_params.bin
//!        │                               │
//!        └─────────────► Trainer ◄───────┘
//!                           │
//!                           ▼
//!                  model_pipeline.bin ──► PipelineCache ──► Predictor
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`](Result):
//!
//! - [`LearningError::InvalidConfig`] - A builder rejected a setting
//! - [`LearningError::InvalidData`] - Too few samples, a single class, no features
//! - [`LearningError::UnknownScoring`] - Unsupported metric name
//! - [`LearningError::Artifact`] - A cached file is missing or unreadable
//!
//! [`LearningError::is_artifact_not_found`] tells a missing model (recoverable
//! by retraining) from every other failure.
//!
//! # Thread Safety
//!
//! [`Predictor`] and [`PipelineCache`] are `Send + Sync`; clone the predictor
//! or share the cache through an `Arc`. Fitting and searching are blocking
//! CPU work: async callers should run them on a blocking thread.

mod bayes;
mod config;
mod error;
pub mod metrics;
mod model;
mod optim;
mod prediction;
pub mod text;
mod training;
mod types;
pub mod validation;

// Re-export public API
//
// Configuration types
pub use config::{
    DEFAULT_CV_FOLDS, DEFAULT_HALVING_FACTOR, DEFAULT_RANDOM_SEED, DEFAULT_SCORE_FOLDS, OptimizerConfig,
    OptimizerConfigBuilder, SearchSpace, SearchStrategy, TrainerConfig, TrainerConfigBuilder,
};
// Error types
pub use error::{LearningError, Result};
// Metrics
pub use metrics::Scoring;
// Pipeline parameters
pub use types::{Analyzer, ClassifierParams, Hyperparameters, PipelineParams, SCORING_KEY, StripAccents, VectorizerParams};
// Models
pub use bayes::MultinomialNb;
pub use model::FittedPipeline;
pub use text::CountVectorizer;
// Stages
pub use optim::{Optimizer, halving_schedule};
pub use prediction::{PipelineCache, Predictor};
pub use training::{ScoreReport, TrainOptions, Trainer};
