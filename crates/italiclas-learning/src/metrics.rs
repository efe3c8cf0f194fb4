//! Binary classification metrics and the closed set of scoring names.
//!
//! Labels are `bool` with `true` as the positive class. Metrics that need
//! a ranking (`roc_auc`, `average_precision`) or a probability
//! (`neg_brier_score`, `neg_log_loss`) take the predicted probability of
//! the positive class.
//!
//! Every [`Scoring`] is "greater is better": losses are negated, as in
//! `neg_log_loss`.

use crate::error::LearningError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scoring metric used to rank configurations during optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    Accuracy,
    BalancedAccuracy,
    AveragePrecision,
    NegBrierScore,
    #[default]
    F1,
    NegLogLoss,
    Precision,
    Recall,
    Jaccard,
    RocAuc,
}

impl Scoring {
    /// Every supported scoring, in display order.
    pub const ALL: [Scoring; 10] = [
        Self::Accuracy,
        Self::BalancedAccuracy,
        Self::AveragePrecision,
        Self::NegBrierScore,
        Self::F1,
        Self::NegLogLoss,
        Self::Precision,
        Self::Recall,
        Self::Jaccard,
        Self::RocAuc,
    ];

    /// Metrics reported by the trainer after fitting.
    pub const REPORT: [Scoring; 5] = [
        Self::Accuracy,
        Self::Precision,
        Self::Recall,
        Self::F1,
        Self::RocAuc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::BalancedAccuracy => "balanced_accuracy",
            Self::AveragePrecision => "average_precision",
            Self::NegBrierScore => "neg_brier_score",
            Self::F1 => "f1",
            Self::NegLogLoss => "neg_log_loss",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::Jaccard => "jaccard",
            Self::RocAuc => "roc_auc",
        }
    }

    /// Score predictions against the truth.
    ///
    /// `proba[i]` is the predicted probability that sample `i` is positive.
    pub fn score(&self, y_true: &[bool], y_pred: &[bool], proba: &[f64]) -> f64 {
        match self {
            Self::Accuracy => accuracy(y_true, y_pred),
            Self::BalancedAccuracy => balanced_accuracy(y_true, y_pred),
            Self::AveragePrecision => average_precision(y_true, proba),
            Self::NegBrierScore => -brier_score(y_true, proba),
            Self::F1 => f1(y_true, y_pred),
            Self::NegLogLoss => -log_loss(y_true, proba),
            Self::Precision => precision(y_true, y_pred),
            Self::Recall => recall(y_true, y_pred),
            Self::Jaccard => jaccard(y_true, y_pred),
            Self::RocAuc => roc_auc(y_true, proba),
        }
    }

    fn supported() -> String {
        Self::ALL
            .iter()
            .map(Scoring::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scoring {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|scoring| scoring.name() == name)
            .ok_or_else(|| LearningError::UnknownScoring {
                name: s.to_string(),
                supported: Self::supported(),
            })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Confusion {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

impl Confusion {
    fn new(y_true: &[bool], y_pred: &[bool]) -> Self {
        let mut c = Self::default();
        for (&truth, &pred) in y_true.iter().zip(y_pred) {
            match (truth, pred) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }
}

/// `num / den`, or zero when the denominator is zero.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

pub fn accuracy(y_true: &[bool], y_pred: &[bool]) -> f64 {
    let c = Confusion::new(y_true, y_pred);
    ratio(c.tp + c.tn, c.tp + c.tn + c.fp + c.fn_)
}

/// Mean recall over the classes present in `y_true`.
pub fn balanced_accuracy(y_true: &[bool], y_pred: &[bool]) -> f64 {
    let c = Confusion::new(y_true, y_pred);
    let mut recalls = Vec::with_capacity(2);
    if c.tp + c.fn_ > 0 {
        recalls.push(ratio(c.tp, c.tp + c.fn_));
    }
    if c.tn + c.fp > 0 {
        recalls.push(ratio(c.tn, c.tn + c.fp));
    }
    if recalls.is_empty() {
        0.0
    } else {
        recalls.iter().sum::<f64>() / recalls.len() as f64
    }
}

pub fn precision(y_true: &[bool], y_pred: &[bool]) -> f64 {
    let c = Confusion::new(y_true, y_pred);
    ratio(c.tp, c.tp + c.fp)
}

pub fn recall(y_true: &[bool], y_pred: &[bool]) -> f64 {
    let c = Confusion::new(y_true, y_pred);
    ratio(c.tp, c.tp + c.fn_)
}

pub fn f1(y_true: &[bool], y_pred: &[bool]) -> f64 {
    let c = Confusion::new(y_true, y_pred);
    ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_)
}

pub fn jaccard(y_true: &[bool], y_pred: &[bool]) -> f64 {
    let c = Confusion::new(y_true, y_pred);
    ratio(c.tp, c.tp + c.fp + c.fn_)
}

pub fn brier_score(y_true: &[bool], proba: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(proba)
        .map(|(&truth, &p)| (p - f64::from(u8::from(truth))).powi(2))
        .sum();
    total / y_true.len() as f64
}

/// Mean negative log-likelihood, with probabilities clipped away from 0 and 1.
pub fn log_loss(y_true: &[bool], proba: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let eps = f64::EPSILON;
    let total: f64 = y_true
        .iter()
        .zip(proba)
        .map(|(&truth, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            if truth { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    total / y_true.len() as f64
}

/// Area under the ROC curve, ties counted as half.
///
/// Undefined (NaN) when `y_true` holds a single class.
pub fn roc_auc(y_true: &[bool], proba: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| proba[a].total_cmp(&proba[b]));

    // Average ranks (1-based) over runs of equal scores
    let mut ranks = vec![0.0; order.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && proba[order[j + 1]] == proba[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let positives = y_true.iter().filter(|&&t| t).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return f64::NAN;
    }
    let rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(truth, _)| **truth)
        .map(|(_, rank)| rank)
        .sum();
    let u = rank_sum - (positives * (positives + 1)) as f64 / 2.0;
    u / (positives * negatives) as f64
}

/// Step-wise area under the precision/recall curve.
pub fn average_precision(y_true: &[bool], proba: &[f64]) -> f64 {
    let positives = y_true.iter().filter(|&&t| t).count();
    if positives == 0 {
        return 0.0;
    }
    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| proba[b].total_cmp(&proba[a]));

    let mut ap = 0.0;
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut i = 0;
    while i < order.len() {
        // All samples sharing a score form one threshold
        let threshold = proba[order[i]];
        while i < order.len() && proba[order[i]] == threshold {
            tp += usize::from(y_true[order[i]]);
            seen += 1;
            i += 1;
        }
        let recall = tp as f64 / positives as f64;
        ap += (recall - prev_recall) * (tp as f64 / seen as f64);
        prev_recall = recall;
    }
    ap
}
