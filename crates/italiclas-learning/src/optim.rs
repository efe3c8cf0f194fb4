//! Hyperparameter search over the pipeline configuration grid.
//!
//! Two strategies are available (see [`SearchStrategy`]):
//!
//! - **Exhaustive**: every candidate is cross-validated on the full dataset.
//! - **Successive halving**: every candidate is cross-validated on a small
//!   stratified sample; the best `1 / factor` survive to the next round,
//!   which uses `factor` times more samples. The schedule is sized so that
//!   the last round runs on (almost) the whole dataset.
//!
//! The winning configuration is persisted as [`Hyperparameters`] and reused
//! until the caller forces a new search.

use crate::config::{OptimizerConfig, SearchStrategy};
use crate::error::{LearningError, Result};
use crate::types::{Hyperparameters, PipelineParams};
use crate::validation::{cross_validate, stratified_k_fold};
use italiclas_data::{ArtifactStore, CleanDataset};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Binary classification.
const N_CLASSES: usize = 2;

/// Runs the search and caches its result.
#[derive(Debug, Clone)]
pub struct Optimizer {
    store: ArtifactStore,
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(store: ArtifactStore, config: OptimizerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Return the hyperparameters stored at `params_path`, searching them on
    /// the clean dataset at `data_path` when missing, stale, or forced.
    ///
    /// # Errors
    ///
    /// - [`LearningError::Artifact`] if the clean dataset is missing or corrupt
    /// - [`LearningError::InvalidData`] if the dataset is too small for the folds
    pub fn optimize(&self, data_path: &Path, params_path: &Path, force: bool) -> Result<Hyperparameters> {
        if !force && let Some(hyper) = self.store.load_cached::<Hyperparameters>(params_path)? {
            info!("[ML] Load parameters from '{}'", params_path.display());
            info!("[ML] Optimal params: {}", hyper.params);
            return Ok(hyper);
        }

        info!("[ML] Load clean data from '{}'", data_path.display());
        let dataset: CleanDataset = self.store.load(data_path)?;
        let hyper = self.search(&dataset)?;

        info!("[ML] Save parameters to '{}'", params_path.display());
        self.store.save(&hyper, params_path)?;
        Ok(hyper)
    }

    /// Search the configured space on `dataset` without touching the cache.
    pub fn search(&self, dataset: &CleanDataset) -> Result<Hyperparameters> {
        let start = Instant::now();
        let candidates = self.config.search_space.candidates();
        info!(
            "[ML] Searching {} candidates ({:?}, {} folds, scoring={})",
            candidates.len(),
            self.config.strategy,
            self.config.cv_folds,
            self.config.scoring
        );

        let (params, best_score) = match self.config.strategy {
            SearchStrategy::Exhaustive => {
                let all: Vec<usize> = (0..dataset.len()).collect();
                let scores = self.evaluate(&candidates, dataset, &all)?;
                best_of(&candidates, &scores)?
            }
            SearchStrategy::SuccessiveHalving => self.successive_halving(candidates, dataset)?,
        };

        info!(
            "[ML] Optimal score ({}): {:.4} in {:.2?}",
            self.config.scoring,
            best_score,
            start.elapsed()
        );
        info!("[ML] Optimal params: {}", params);
        Ok(Hyperparameters {
            params,
            scoring: self.config.scoring,
            best_score,
        })
    }

    fn successive_halving(
        &self,
        mut candidates: Vec<PipelineParams>,
        dataset: &CleanDataset,
    ) -> Result<(PipelineParams, f64)> {
        let factor = self.config.halving_factor;
        let schedule = halving_schedule(candidates.len(), dataset.len(), self.config.cv_folds, factor)?;
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);

        let last_round = schedule.len() - 1;
        for (round, &n_samples) in schedule.iter().enumerate() {
            let indices = stratified_subsample(dataset.labels(), n_samples, self.config.cv_folds, &mut rng);
            info!(
                "[ML] Halving round {}/{}: {} candidates on {} samples",
                round + 1,
                schedule.len(),
                candidates.len(),
                indices.len()
            );
            let scores = self.evaluate(&candidates, dataset, &indices)?;

            if round == last_round {
                return best_of(&candidates, &scores);
            }
            let keep = candidates.len().div_ceil(factor);
            let mut ranked: Vec<usize> = (0..candidates.len()).collect();
            // Stable sort: ties keep grid order
            ranked.sort_by(|&a, &b| descending(scores[a], scores[b]));
            ranked.truncate(keep);
            ranked.sort_unstable();
            candidates = ranked.into_iter().map(|i| candidates[i]).collect();
        }

        Err(LearningError::InvalidData("empty halving schedule".to_string()))
    }

    /// Mean cross-validation score of each candidate on `indices`.
    ///
    /// A candidate that cannot be fitted on a sample scores NaN.
    fn evaluate(&self, candidates: &[PipelineParams], dataset: &CleanDataset, indices: &[usize]) -> Result<Vec<f64>> {
        let labels: Vec<bool> = indices.iter().map(|&i| dataset.labels()[i]).collect();
        stratified_k_fold(&labels, self.config.cv_folds)?;

        let scoring = [self.config.scoring];
        let mut scores = Vec::with_capacity(candidates.len());
        for params in candidates {
            let score = match cross_validate(
                params,
                dataset.texts(),
                dataset.labels(),
                Some(indices),
                self.config.cv_folds,
                &scoring,
            ) {
                Ok(score) => score[0],
                Err(e) => {
                    warn!("[ML] Candidate {} failed: {}", params, e);
                    f64::NAN
                }
            };
            debug!("[ML] {} = {:.4} for {}", self.config.scoring, score, params);
            scores.push(score);
        }
        Ok(scores)
    }
}

/// Number of samples used in each halving round.
///
/// Mirrors the "exhaust" policy: the first round is sized so that the last
/// one uses as much of the dataset as possible, but never fewer than
/// `2 * folds * classes` samples.
pub fn halving_schedule(n_candidates: usize, n_samples: usize, folds: usize, factor: usize) -> Result<Vec<usize>> {
    let smallest = 2 * folds * N_CLASSES;
    if n_samples < smallest {
        return Err(LearningError::InvalidData(format!(
            "successive halving with {folds} folds needs at least {smallest} samples, got {n_samples}"
        )));
    }

    let n_required = 1 + floor_log(n_candidates.max(1), factor);
    let divisor = factor.saturating_pow(floor_log(n_candidates.max(1), factor) as u32);
    let min_resources = smallest.max(n_samples / divisor);
    let n_possible = 1 + floor_log(n_samples / min_resources, factor);
    let n_rounds = n_required.min(n_possible);

    Ok((0..n_rounds)
        .map(|round| {
            min_resources
                .saturating_mul(factor.saturating_pow(round as u32))
                .min(n_samples)
        })
        .collect())
}

/// `floor(log_base(value))` for `value >= 1`.
fn floor_log(mut value: usize, base: usize) -> usize {
    let mut power = 0;
    while value >= base {
        value /= base;
        power += 1;
    }
    power
}

/// Pick `n` indices keeping the class ratio, each class keeping at least
/// `min_per_class` samples when it has them. Returned in ascending order.
fn stratified_subsample(labels: &[bool], n: usize, min_per_class: usize, rng: &mut StdRng) -> Vec<usize> {
    if n >= labels.len() {
        return (0..labels.len()).collect();
    }
    let (mut pos, mut neg): (Vec<usize>, Vec<usize>) = (0..labels.len()).partition(|&i| labels[i]);
    pos.shuffle(rng);
    neg.shuffle(rng);

    let want_pos = (n as f64 * pos.len() as f64 / labels.len() as f64).round() as usize;
    let want_pos = want_pos.clamp(min_per_class.min(pos.len()), pos.len());
    let want_neg = n
        .saturating_sub(want_pos)
        .clamp(min_per_class.min(neg.len()), neg.len());

    let mut picked: Vec<usize> = pos[..want_pos].iter().chain(&neg[..want_neg]).copied().collect();
    picked.sort_unstable();
    picked
}

/// Order scores from best to worst, NaN last.
fn descending(a: f64, b: f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Highest scoring candidate; the earliest wins ties.
fn best_of(candidates: &[PipelineParams], scores: &[f64]) -> Result<(PipelineParams, f64)> {
    let best = (0..candidates.len())
        .filter(|&i| !scores[i].is_nan())
        .fold(None, |best: Option<usize>, i| match best {
            Some(b) if scores[b] >= scores[i] => Some(b),
            _ => Some(i),
        });
    match best {
        Some(i) => Ok((candidates[i], scores[i])),
        None => Err(LearningError::InvalidData(
            "no candidate configuration could be evaluated".to_string(),
        )),
    }
}
