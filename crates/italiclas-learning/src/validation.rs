//! Stratified k-fold cross-validation.

use crate::error::{LearningError, Result};
use crate::metrics::Scoring;
use crate::model::FittedPipeline;
use crate::types::PipelineParams;

/// Train/test index split for one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `labels` into `k` folds keeping the class ratio in each test fold.
///
/// No shuffling: within each class, samples are dealt to folds in order,
/// the first folds receiving one extra sample when the class size is not a
/// multiple of `k`.
///
/// # Errors
///
/// [`LearningError::InvalidData`] if `k < 2` or a class has fewer than `k`
/// samples.
pub fn stratified_k_fold(labels: &[bool], k: usize) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(LearningError::InvalidData(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }

    // Classes in order of first appearance
    let Some(&first) = labels.first() else {
        return Err(LearningError::InvalidData(
            "cross-validation needs samples".to_string(),
        ));
    };
    let classes = [first, !first];
    let counts = classes.map(|class| labels.iter().filter(|&&l| l == class).count());
    if let Some(&smallest) = counts.iter().min()
        && smallest < k
    {
        return Err(LearningError::InvalidData(format!(
            "every class needs at least {k} samples for {k}-fold cross-validation, smallest has {smallest}"
        )));
    }

    // allocation[fold][class]: deal the class-sorted labels round-robin
    let mut allocation = vec![[0usize; 2]; k];
    let mut position = 0;
    for (class_idx, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            allocation[position % k][class_idx] += 1;
            position += 1;
        }
    }

    let mut test_fold = vec![0usize; labels.len()];
    for (class_idx, &class) in classes.iter().enumerate() {
        let folds = (0..k).flat_map(|fold| std::iter::repeat_n(fold, allocation[fold][class_idx]));
        let members = labels.iter().enumerate().filter(|(_, l)| **l == class).map(|(i, _)| i);
        for (sample, fold) in members.zip(folds) {
            test_fold[sample] = fold;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| test_fold[i] == fold);
            Fold { train, test }
        })
        .collect())
}

/// Mean score of `params` for each of `scorings` over stratified folds.
///
/// `indices` selects the samples taking part (all samples when `None`).
pub fn cross_validate<S: AsRef<str>>(
    params: &PipelineParams,
    texts: &[S],
    labels: &[bool],
    indices: Option<&[usize]>,
    folds: usize,
    scorings: &[Scoring],
) -> Result<Vec<f64>> {
    let all: Vec<usize>;
    let indices = match indices {
        Some(indices) => indices,
        None => {
            all = (0..texts.len()).collect();
            &all
        }
    };
    let subset_labels: Vec<bool> = indices.iter().map(|&i| labels[i]).collect();

    let mut totals = vec![0.0; scorings.len()];
    let splits = stratified_k_fold(&subset_labels, folds)?;
    for fold in &splits {
        let train_texts: Vec<&str> = fold.train.iter().map(|&i| texts[indices[i]].as_ref()).collect();
        let train_labels: Vec<bool> = fold.train.iter().map(|&i| subset_labels[i]).collect();
        let test_texts: Vec<&str> = fold.test.iter().map(|&i| texts[indices[i]].as_ref()).collect();
        let y_true: Vec<bool> = fold.test.iter().map(|&i| subset_labels[i]).collect();

        let pipeline = FittedPipeline::fit(*params, &train_texts, &train_labels)?;
        let y_pred = pipeline.predict(&test_texts);
        let proba = pipeline.predict_proba(&test_texts);

        for (total, scoring) in totals.iter_mut().zip(scorings) {
            *total += scoring.score(&y_true, &y_pred, &proba);
        }
    }

    let n = splits.len() as f64;
    Ok(totals.into_iter().map(|total| total / n).collect())
}
