//! Multinomial naive Bayes over sparse count vectors.
//!
//! Classes are indexed `0 = false`, `1 = true`. When both classes score the
//! same the negative class wins, so a document without any known feature
//! falls back to the prior (and to `false` under a uniform prior).

use crate::error::{LearningError, Result};
use crate::text::SparseRow;
use crate::types::ClassifierParams;
use serde::{Deserialize, Serialize};

/// Smallest smoothing value accepted; lower values are clipped.
const MIN_ALPHA: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultinomialNb {
    params: ClassifierParams,
    class_log_prior: [f64; 2],
    feature_log_prob: [Vec<f64>; 2],
}

impl MultinomialNb {
    /// Fit on count vectors with `n_features` columns.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidConfig`] if `alpha` is negative or not finite
    /// - [`LearningError::InvalidData`] if the sizes disagree or one class is absent
    pub fn fit(params: ClassifierParams, rows: &[SparseRow], labels: &[bool], n_features: usize) -> Result<Self> {
        if !params.alpha.is_finite() || params.alpha < 0.0 {
            return Err(LearningError::InvalidConfig(format!(
                "alpha must be a non-negative number, got {}",
                params.alpha
            )));
        }
        if rows.len() != labels.len() {
            return Err(LearningError::InvalidData(format!(
                "{} samples but {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let mut class_count = [0usize; 2];
        let mut feature_count = [vec![0.0; n_features], vec![0.0; n_features]];
        for (row, &label) in rows.iter().zip(labels) {
            let class = usize::from(label);
            class_count[class] += 1;
            for &(idx, count) in row {
                if idx < n_features {
                    feature_count[class][idx] += f64::from(count);
                }
            }
        }
        if class_count.contains(&0) {
            return Err(LearningError::InvalidData(format!(
                "training data needs both classes, got {} negative and {} positive samples",
                class_count[0], class_count[1]
            )));
        }

        let alpha = params.alpha.max(MIN_ALPHA);
        let feature_log_prob: [Vec<f64>; 2] = feature_count.map(|counts| {
            let total: f64 = counts.iter().sum::<f64>() + alpha * n_features as f64;
            let log_total = total.ln();
            counts.iter().map(|&c| (c + alpha).ln() - log_total).collect()
        });

        let class_log_prior = if params.fit_prior {
            let n = rows.len() as f64;
            class_count.map(|count| (count as f64 / n).ln())
        } else {
            [0.5f64.ln(); 2]
        };

        Ok(Self {
            params,
            class_log_prior,
            feature_log_prob,
        })
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.feature_log_prob[0].len()
    }

    /// Unnormalized log-probability of each class.
    pub fn joint_log_likelihood(&self, row: &SparseRow) -> [f64; 2] {
        let mut jll = self.class_log_prior;
        for (class, score) in jll.iter_mut().enumerate() {
            let log_prob = &self.feature_log_prob[class];
            for &(idx, count) in row {
                if let Some(lp) = log_prob.get(idx) {
                    *score += f64::from(count) * lp;
                }
            }
        }
        jll
    }

    pub fn predict(&self, row: &SparseRow) -> bool {
        let [neg, pos] = self.joint_log_likelihood(row);
        pos > neg
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, row: &SparseRow) -> f64 {
        let [neg, pos] = self.joint_log_likelihood(row);
        // Logistic of the log-odds, stable for large magnitudes
        let diff = pos - neg;
        if diff >= 0.0 {
            1.0 / (1.0 + (-diff).exp())
        } else {
            let e = diff.exp();
            e / (1.0 + e)
        }
    }
}
