//! Cross-validation splitters and fold-wise scoring

use super::decision_tree::proba_to_labels;
use super::models::{Classifier, ModelParams, ESTIMATOR_SEED};
use crate::error::{MetrixError, Result};
use crate::metrics::{accuracy_score, f1_score, precision_score, recall_score, roc_auc_score};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Cross-validation strategy; folds are contiguous, never shuffled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 10 }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits } | CVStrategy::StratifiedKFold { n_splits } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CVStrategy,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self { strategy }
    }

    /// Stratified k-fold, the tuner's default
    pub fn stratified(n_splits: usize) -> Self {
        Self::new(CVStrategy::StratifiedKFold { n_splits })
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(MetrixError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(MetrixError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let test_folds = match self.strategy {
            CVStrategy::KFold { .. } => k_fold_assignment(n_samples, n_splits),
            CVStrategy::StratifiedKFold { .. } => {
                let y = y.ok_or_else(|| {
                    MetrixError::ValidationError(
                        "StratifiedKFold requires target array".to_string(),
                    )
                })?;
                if y.len() != n_samples {
                    return Err(MetrixError::ShapeError {
                        expected: format!("{} labels", n_samples),
                        actual: format!("{} labels", y.len()),
                    });
                }
                stratified_assignment(y, n_splits)?
            }
        };

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| test_folds[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();
        Ok(splits)
    }
}

/// Contiguous folds, the first `n % k` one sample larger
fn k_fold_assignment(n_samples: usize, n_splits: usize) -> Vec<usize> {
    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;
    let mut folds = Vec::with_capacity(n_samples);
    for fold in 0..n_splits {
        let size = if fold < remainder { base + 1 } else { base };
        folds.extend(std::iter::repeat(fold).take(size));
    }
    folds
}

/// Fold per sample.
///
/// Per-fold class counts are read off the sorted labels taken every
/// `n_splits`-th element; each class then fills the folds in order.
fn stratified_assignment(y: &Array1<f64>, n_splits: usize) -> Result<Vec<usize>> {
    let mut class_ids: BTreeMap<i64, usize> = BTreeMap::new();
    for &v in y {
        class_ids.entry(v.round() as i64).or_insert(0);
    }
    for (k, id) in class_ids.values_mut().enumerate() {
        *id = k;
    }
    let encoded: Vec<usize> = y.iter().map(|v| class_ids[&(v.round() as i64)]).collect();
    let n_classes = class_ids.len();

    let mut counts = vec![0usize; n_classes];
    for &c in &encoded {
        counts[c] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let min_count = counts.iter().copied().min().unwrap_or(0);
    if n_splits > max_count {
        return Err(MetrixError::ValidationError(format!(
            "n_splits={} cannot be greater than the number of members in each class",
            n_splits
        )));
    }
    if n_splits > min_count {
        warn!(
            n_splits,
            least_populated = min_count,
            "The least populated class has fewer members than n_splits"
        );
    }

    let mut sorted = encoded.clone();
    sorted.sort_unstable();
    let mut allocation = vec![vec![0usize; n_classes]; n_splits];
    for (fold, row) in allocation.iter_mut().enumerate() {
        for &c in sorted.iter().skip(fold).step_by(n_splits) {
            row[c] += 1;
        }
    }

    let mut test_folds = vec![0usize; y.len()];
    for class in 0..n_classes {
        let mut order = (0..n_splits).flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]));
        for (i, &c) in encoded.iter().enumerate() {
            if c == class {
                test_folds[i] = order.next().ok_or_else(|| {
                    MetrixError::ValidationError("fold allocation does not cover every sample".to_string())
                })?;
            }
        }
    }
    Ok(test_folds)
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Fold-level score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    Accuracy,
    RocAuc,
    Recall,
    Precision,
    F1,
}

impl Scoring {
    pub const SUMMARY: [Scoring; 5] = [
        Scoring::Accuracy,
        Scoring::RocAuc,
        Scoring::Recall,
        Scoring::Precision,
        Scoring::F1,
    ];

    /// Score one fold from its labels and positive-class probabilities
    pub fn score(&self, y_true: &Array1<f64>, proba: &Array2<f64>) -> Result<f64> {
        match self {
            Scoring::RocAuc => roc_auc_score(y_true, &proba.column(1).to_owned()),
            Scoring::Accuracy => accuracy_score(y_true, &proba_to_labels(proba)),
            Scoring::Recall => recall_score(y_true, &proba_to_labels(proba)),
            Scoring::Precision => precision_score(y_true, &proba_to_labels(proba)),
            Scoring::F1 => f1_score(y_true, &proba_to_labels(proba)),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scoring::Accuracy => "accuracy",
            Scoring::RocAuc => "roc_auc",
            Scoring::Recall => "recall",
            Scoring::Precision => "precision",
            Scoring::F1 => "f1",
        };
        f.write_str(s)
    }
}

/// Fit a fresh estimator on the fold's training rows and return test-row probabilities
fn fit_fold(params: &ModelParams, x: &Array2<f64>, y: &Array1<f64>, split: &CVSplit) -> Result<Array2<f64>> {
    let x_train = x.select(Axis(0), &split.train_indices);
    let y_train = y.select(Axis(0), &split.train_indices);
    let mut model = params.build(ESTIMATOR_SEED)?;
    model.fit(&x_train, &y_train)?;
    model.predict_proba(&x.select(Axis(0), &split.test_indices))
}

fn check_rows(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MetrixError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    Ok(())
}

/// Evaluate several scores with one fit per fold
pub fn cross_validate(
    params: &ModelParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
    scorings: &[Scoring],
) -> Result<Vec<(Scoring, CVResults)>> {
    check_rows(x, y)?;
    let per_fold: Vec<Vec<f64>> = splits
        .par_iter()
        .map(|split| -> Result<Vec<f64>> {
            let proba = fit_fold(params, x, y, split)?;
            let y_test = y.select(Axis(0), &split.test_indices);
            scorings
                .iter()
                .map(|s| s.score(&y_test, &proba))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    let results = scorings
        .iter()
        .enumerate()
        .map(|(k, &scoring)| {
            let scores = per_fold.iter().map(|fold| fold[k]).collect();
            (scoring, CVResults::from_scores(scores))
        })
        .collect();
    Ok(results)
}

/// Fold scores of one metric
pub fn cross_val_score(
    params: &ModelParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
    scoring: Scoring,
) -> Result<CVResults> {
    let mut results = cross_validate(params, x, y, splits, &[scoring])?;
    let (_, cv) = results.pop().ok_or_else(|| {
        MetrixError::TrainingError("cross-validation produced no results".to_string())
    })?;
    debug!(%scoring, mean = cv.mean_score, folds = cv.n_folds, "Cross-validated");
    Ok(cv)
}

/// Out-of-fold predicted labels and class probabilities for every sample
pub fn cross_val_predict(
    params: &ModelParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
) -> Result<(Array1<f64>, Array2<f64>)> {
    check_rows(x, y)?;
    let fold_proba: Vec<Array2<f64>> = splits
        .par_iter()
        .map(|split| fit_fold(params, x, y, split))
        .collect::<Result<_>>()?;

    let mut proba = Array2::zeros((x.nrows(), 2));
    let mut seen = vec![false; x.nrows()];
    for (split, fp) in splits.iter().zip(&fold_proba) {
        for (row, &i) in split.test_indices.iter().enumerate() {
            if seen[i] {
                return Err(MetrixError::ValidationError(format!(
                    "sample {} appears in more than one test fold",
                    i
                )));
            }
            seen[i] = true;
            proba.row_mut(i).assign(&fp.row(row));
        }
    }
    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(MetrixError::ValidationError(format!(
            "sample {} is in no test fold",
            missing
        )));
    }

    let pred = proba_to_labels(&proba);
    Ok((pred, proba))
}
