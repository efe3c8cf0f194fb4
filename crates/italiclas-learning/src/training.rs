//! Fit the final pipeline and persist it.

use crate::config::TrainerConfig;
use crate::error::Result;
use crate::metrics::Scoring;
use crate::model::FittedPipeline;
use crate::optim::Optimizer;
use crate::validation::cross_validate;
use italiclas_data::{ArtifactStore, CleanDataset};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Switches for a [`Trainer::train`] call. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainOptions {
    /// Rerun the hyperparameter search even if parameters are cached.
    pub optimize: bool,
    /// Cross-validate the final configuration and log the scores.
    pub compute_scores: bool,
    /// Refit even if a pipeline is cached.
    pub force: bool,
}

/// Cross-validated scores of the trained configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub folds: usize,
    pub scores: Vec<(Scoring, f64)>,
}

impl ScoreReport {
    pub fn get(&self, scoring: Scoring) -> Option<f64> {
        self.scores
            .iter()
            .find(|(s, _)| *s == scoring)
            .map(|(_, value)| *value)
    }
}

/// Produces the served pipeline from the clean dataset.
#[derive(Debug, Clone)]
pub struct Trainer {
    store: ArtifactStore,
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(store: ArtifactStore, config: TrainerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Return the pipeline at `pipeline_path`, fitting and saving it first
    /// when missing, stale, or forced.
    ///
    /// A fit uses the hyperparameters at `params_path` (searched if absent
    /// or when `options.optimize` is set) and the whole dataset at
    /// `data_path`.
    pub fn train(
        &self,
        data_path: &Path,
        pipeline_path: &Path,
        params_path: &Path,
        options: TrainOptions,
    ) -> Result<FittedPipeline> {
        self.train_with_report(data_path, pipeline_path, params_path, options)
            .map(|(pipeline, _)| pipeline)
    }

    /// Like [`train`](Self::train), also returning the scores when
    /// `options.compute_scores` is set.
    pub fn train_with_report(
        &self,
        data_path: &Path,
        pipeline_path: &Path,
        params_path: &Path,
        options: TrainOptions,
    ) -> Result<(FittedPipeline, Option<ScoreReport>)> {
        if !options.force
            && let Some(pipeline) = self.store.load_cached::<FittedPipeline>(pipeline_path)?
        {
            info!("[ML] Load model pipeline from '{}'", pipeline_path.display());
            let report = if options.compute_scores {
                let dataset: CleanDataset = self.store.load(data_path)?;
                Some(self.score(&pipeline, &dataset)?)
            } else {
                None
            };
            return Ok((pipeline, report));
        }

        let optimizer = Optimizer::new(self.store, self.config.optimizer.clone());
        let hyper = optimizer.optimize(data_path, params_path, options.optimize)?;

        info!("[ML] Load clean data from '{}'", data_path.display());
        let dataset: CleanDataset = self.store.load(data_path)?;

        let start = Instant::now();
        let pipeline = FittedPipeline::fit(hyper.params, dataset.texts(), dataset.labels())?;
        info!(
            "[ML] Fitted pipeline on {} samples ({} features) in {:.2?}",
            dataset.len(),
            pipeline.n_features(),
            start.elapsed()
        );

        let report = if options.compute_scores {
            Some(self.score(&pipeline, &dataset)?)
        } else {
            None
        };

        info!("[ML] Save model pipeline to '{}'", pipeline_path.display());
        self.store.save(&pipeline, pipeline_path)?;
        Ok((pipeline, report))
    }

    /// Cross-validate the configuration of `pipeline` over [`Scoring::REPORT`].
    pub fn score(&self, pipeline: &FittedPipeline, dataset: &CleanDataset) -> Result<ScoreReport> {
        let start = Instant::now();
        let folds = self.config.score_folds;
        let values = cross_validate(
            pipeline.params(),
            dataset.texts(),
            dataset.labels(),
            None,
            folds,
            &Scoring::REPORT,
        )?;

        let scores: Vec<(Scoring, f64)> = Scoring::REPORT.into_iter().zip(values).collect();
        for (scoring, value) in &scores {
            info!("[ML] {} = {:.4}", scoring, value);
        }
        info!("[ML] Scored {} folds in {:.2?}", folds, start.elapsed());
        Ok(ScoreReport { folds, scores })
    }
}
