//! Confusion-matrix metrics for binary labels
//!
//! Every metric is computed twice: once by arithmetic on the four confusion
//! counts and once directly from the label vectors. The two must agree; a
//! disagreement is reported as [`MetrixError::MetricMismatch`]. A zero
//! denominator yields 0 in both computations.

use crate::error::{MetrixError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Largest tolerated difference between manual and direct values
pub const CROSS_CHECK_TOLERANCE: f64 = 1e-9;

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(MetrixError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(MetrixError::MetricError("no samples to score".to_string()));
    }
    Ok(())
}

/// Binary confusion matrix, positive class = 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Count outcomes of predictions against truth
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let mut cm = ConfusionMatrix {
            tn: 0,
            fp: 0,
            fn_: 0,
            tp: 0,
        };
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t > 0.5, p > 0.5) {
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
                (true, true) => cm.tp += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    /// Rows = truth, columns = prediction, class 0 first
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }
}

/// The seven confusion-matrix statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMetrics {
    pub accuracy: f64,
    pub classification_error: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub false_positive_rate: f64,
    pub precision: f64,
    pub f1: f64,
}

impl ConfusionMetrics {
    /// Arithmetic on the confusion counts
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let tp = cm.tp as f64;
        let tn = cm.tn as f64;
        let fp = cm.fp as f64;
        let fn_ = cm.fn_ as f64;
        let total = cm.total() as f64;

        Self {
            accuracy: ratio(tp + tn, total),
            classification_error: ratio(fp + fn_, total),
            sensitivity: ratio(tp, tp + fn_),
            specificity: ratio(tn, tn + fp),
            false_positive_rate: ratio(fp, tn + fp),
            precision: ratio(tp, tp + fp),
            f1: ratio(2.0 * tp, 2.0 * tp + fp + fn_),
        }
    }

    /// Scoring functions over the label vectors
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        let accuracy = accuracy_score(y_true, y_pred)?;
        let precision = precision_score(y_true, y_pred)?;
        let sensitivity = recall_score(y_true, y_pred)?;
        Ok(Self {
            accuracy,
            classification_error: 1.0 - accuracy,
            sensitivity,
            specificity: specificity_score(y_true, y_pred)?,
            false_positive_rate: fall_out_score(y_true, y_pred)?,
            precision,
            f1: ratio(2.0 * precision * sensitivity, precision + sensitivity),
        })
    }

    /// Metric names and values, in reporting order
    pub fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("accuracy", self.accuracy),
            ("classification_error", self.classification_error),
            ("sensitivity", self.sensitivity),
            ("specificity", self.specificity),
            ("false_positive_rate", self.false_positive_rate),
            ("precision", self.precision),
            ("f1", self.f1),
        ]
    }

    /// Fail on the first metric where the two computations disagree
    pub fn cross_check(&self, direct: &ConfusionMetrics, view: &str) -> Result<()> {
        for ((metric, manual), (_, direct)) in self.named().into_iter().zip(direct.named()) {
            if (manual - direct).abs() > CROSS_CHECK_TOLERANCE {
                return Err(MetrixError::MetricMismatch {
                    metric: metric.to_string(),
                    view: view.to_string(),
                    manual,
                    direct,
                });
            }
        }
        Ok(())
    }
}

fn count_where(y_true: &Array1<f64>, y_pred: &Array1<f64>, t: bool, p: Option<bool>) -> f64 {
    y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|&(&yt, &yp)| (yt > 0.5) == t && p.map_or(true, |p| (yp > 0.5) == p))
        .count() as f64
}

/// Fraction of exact matches
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|&(&t, &p)| (t > 0.5) == (p > 0.5))
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// True positives over predicted positives
pub fn precision_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let predicted = y_pred.iter().filter(|&&p| p > 0.5).count() as f64;
    Ok(ratio(count_where(y_true, y_pred, true, Some(true)), predicted))
}

/// True positives over actual positives (sensitivity)
pub fn recall_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    Ok(ratio(
        count_where(y_true, y_pred, true, Some(true)),
        count_where(y_true, y_pred, true, None),
    ))
}

/// True negatives over actual negatives
pub fn specificity_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    Ok(ratio(
        count_where(y_true, y_pred, false, Some(false)),
        count_where(y_true, y_pred, false, None),
    ))
}

/// False positives over actual negatives
pub fn fall_out_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    Ok(ratio(
        count_where(y_true, y_pred, false, Some(true)),
        count_where(y_true, y_pred, false, None),
    ))
}

/// Harmonic mean of precision and recall
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    let p = precision_score(y_true, y_pred)?;
    let r = recall_score(y_true, y_pred)?;
    Ok(ratio(2.0 * p * r, p + r))
}

/// Summary of a prediction vector against the truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionStats {
    pub accuracy: f64,
    pub n_zeros: usize,
    pub n_ones: usize,
    pub fraction_ones: f64,
    pub fraction_zeros: f64,
    /// Accuracy of always predicting the majority class
    pub null_accuracy: f64,
}

impl PredictionStats {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        let accuracy = accuracy_score(y_true, y_pred)?;
        let n = y_true.len() as f64;
        let n_ones = y_true.iter().filter(|&&v| v > 0.5).count();
        let n_zeros = y_true.len() - n_ones;
        let fraction_ones = n_ones as f64 / n;
        let fraction_zeros = n_zeros as f64 / n;
        Ok(Self {
            accuracy,
            n_zeros,
            n_ones,
            fraction_ones,
            fraction_zeros,
            null_accuracy: fraction_ones.max(fraction_zeros),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_counts() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred).unwrap();

        assert_eq!(cm.tp, 3);
        assert_eq!(cm.tn, 3);
        assert_eq!(cm.fp, 1);
        assert_eq!(cm.fn_, 1);
        assert_eq!(cm.total(), 8);
        assert_eq!(cm.as_rows(), [[3, 1], [1, 3]]);
    }

    /// Labels holding exactly the given counts, outcomes interleaved
    fn labels_for(tp: usize, tn: usize, fp: usize, fn_: usize) -> (Array1<f64>, Array1<f64>) {
        let mut left = [tp, tn, fp, fn_];
        let outcomes = [(1.0, 1.0), (0.0, 0.0), (0.0, 1.0), (1.0, 0.0)];
        let (mut y_true, mut y_pred) = (Vec::new(), Vec::new());
        while left.iter().any(|&n| n > 0) {
            for (n, &(t, p)) in left.iter_mut().zip(&outcomes) {
                if *n > 0 {
                    *n -= 1;
                    y_true.push(t);
                    y_pred.push(p);
                }
            }
        }
        (Array1::from_vec(y_true), Array1::from_vec(y_pred))
    }

    #[test]
    fn test_manual_matches_direct_over_count_grid() {
        for tp in 0..=6 {
            for tn in 0..=6 {
                for fp in 0..=6 {
                    for fn_ in 0..=6 {
                        let n = tp + tn + fp + fn_;
                        let (y_true, y_pred) = labels_for(tp, tn, fp, fn_);
                        if n == 0 {
                            assert!(ConfusionMatrix::from_labels(&y_true, &y_pred).is_err());
                            continue;
                        }

                        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred).unwrap();
                        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (tp, tn, fp, fn_));
                        assert_eq!(cm.tp + cm.tn + cm.fp + cm.fn_, n);

                        let manual = ConfusionMetrics::from_confusion(&cm);
                        let direct = ConfusionMetrics::from_labels(&y_true, &y_pred).unwrap();
                        let case = format!("tp={} tn={} fp={} fn={}", tp, tn, fp, fn_);
                        if let Err(e) = manual.cross_check(&direct, &case) {
                            panic!("{}: {}", case, e);
                        }
                        for (name, v) in manual.named() {
                            assert!(v.is_finite() && (0.0..=1.0).contains(&v), "{} {} = {}", case, name, v);
                        }
                        let expected_accuracy = (tp + tn) as f64 / n as f64;
                        assert!((direct.accuracy - expected_accuracy).abs() < CROSS_CHECK_TOLERANCE);
                        if tp + fn_ == 0 {
                            assert_eq!(direct.sensitivity, 0.0, "{}", case);
                        }
                        if tp + fp == 0 {
                            assert_eq!(direct.precision, 0.0, "{}", case);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_manual_matches_direct() {
        let cases = [
            (array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0], array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]),
            (array![1.0, 1.0, 1.0, 0.0, 0.0], array![0.0, 1.0, 1.0, 1.0, 1.0]),
            (array![0.0, 1.0, 0.0], array![0.0, 0.0, 0.0]),
        ];
        for (y_true, y_pred) in cases {
            let cm = ConfusionMatrix::from_labels(&y_true, &y_pred).unwrap();
            let manual = ConfusionMetrics::from_confusion(&cm);
            let direct = ConfusionMetrics::from_labels(&y_true, &y_pred).unwrap();
            manual.cross_check(&direct, "test").unwrap();
        }
    }

    #[test]
    fn test_values() {
        let y_true = array![1.0, 1.0, 1.0, 0.0, 0.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 0.0];
        let m = ConfusionMetrics::from_labels(&y_true, &y_pred).unwrap();

        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.sensitivity - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.specificity - 0.5).abs() < 1e-12);
        assert!((m.false_positive_rate - 0.5).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators() {
        // only negatives, nothing predicted positive
        let y_true = array![0.0, 0.0];
        let y_pred = array![0.0, 0.0];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred).unwrap();
        let manual = ConfusionMetrics::from_confusion(&cm);
        let direct = ConfusionMetrics::from_labels(&y_true, &y_pred).unwrap();

        assert_eq!(manual.precision, 0.0);
        assert_eq!(manual.sensitivity, 0.0);
        assert_eq!(manual.f1, 0.0);
        manual.cross_check(&direct, "test").unwrap();
    }

    #[test]
    fn test_mismatch_detected() {
        let y_true = array![1.0, 0.0];
        let y_pred = array![1.0, 0.0];
        let manual = ConfusionMetrics::from_labels(&y_true, &y_pred).unwrap();
        let mut other = manual;
        other.precision = 0.5;
        let err = manual.cross_check(&other, "cv").unwrap_err();
        match err {
            MetrixError::MetricMismatch { metric, view, .. } => {
                assert_eq!(metric, "precision");
                assert_eq!(view, "cv");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prediction_stats() {
        let y_true = array![1.0, 0.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0];
        let stats = PredictionStats::compute(&y_true, &y_pred).unwrap();
        assert_eq!(stats.n_ones, 1);
        assert_eq!(stats.n_zeros, 3);
        assert!((stats.null_accuracy - 0.75).abs() < 1e-12);
        assert!((stats.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(accuracy_score(&array![1.0], &array![1.0, 0.0]).is_err());
    }
}
