//! Threshold curves from probability scores: ROC and precision-recall

use crate::error::{MetrixError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Receiver operating characteristic curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decreasing; the first threshold is +inf
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Trapezoidal area under the curve
    pub fn auc(&self) -> f64 {
        auc(&self.fpr, &self.tpr)
    }

    /// Sensitivity and specificity at the last point whose threshold exceeds `threshold`
    pub fn operating_point(&self, threshold: f64) -> (f64, f64) {
        // thresholds decrease and start at +inf, so index 0 always qualifies
        let k = self
            .thresholds
            .iter()
            .rposition(|&t| t > threshold)
            .unwrap_or(0);
        (self.tpr[k], 1.0 - self.fpr[k])
    }
}

/// Precision-recall curve, recall decreasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    /// Increasing; one fewer than precision/recall
    pub thresholds: Vec<f64>,
}

/// Cumulative false/true positive counts at each distinct score, highest score first
struct BinaryCounts {
    fps: Vec<f64>,
    tps: Vec<f64>,
    thresholds: Vec<f64>,
}

fn binary_counts(y_true: &Array1<f64>, scores: &Array1<f64>, pos_label: f64) -> Result<BinaryCounts> {
    if y_true.len() != scores.len() {
        return Err(MetrixError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(MetrixError::MetricError(format!("non-finite score {}", bad)));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    // stable sort keeps input order among equal scores
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut counts = BinaryCounts {
        fps: Vec::new(),
        tps: Vec::new(),
        thresholds: Vec::new(),
    };
    let (mut tp, mut fp) = (0.0, 0.0);
    for (k, &i) in order.iter().enumerate() {
        if y_true[i] == pos_label {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_value = order
            .get(k + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_value {
            counts.tps.push(tp);
            counts.fps.push(fp);
            counts.thresholds.push(scores[i]);
        }
    }
    Ok(counts)
}

/// ROC curve for `pos_label`; both classes must be present
pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>, pos_label: f64) -> Result<RocCurve> {
    let counts = binary_counts(y_true, scores, pos_label)?;
    let total_tp = counts.tps.last().copied().unwrap_or(0.0);
    let total_fp = counts.fps.last().copied().unwrap_or(0.0);
    if total_tp == 0.0 || total_fp == 0.0 {
        return Err(MetrixError::MetricError(
            "ROC curve is undefined when only one class is present".to_string(),
        ));
    }

    let mut fpr = Vec::with_capacity(counts.fps.len() + 1);
    let mut tpr = Vec::with_capacity(counts.tps.len() + 1);
    let mut thresholds = Vec::with_capacity(counts.thresholds.len() + 1);
    fpr.push(0.0);
    tpr.push(0.0);
    thresholds.push(f64::INFINITY);
    for ((fp, tp), t) in counts.fps.iter().zip(&counts.tps).zip(&counts.thresholds) {
        fpr.push(fp / total_fp);
        tpr.push(tp / total_tp);
        thresholds.push(*t);
    }

    Ok(RocCurve {
        fpr,
        tpr,
        thresholds,
    })
}

/// Area under the ROC curve of the positive class (label 1)
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    Ok(roc_curve(y_true, scores, 1.0)?.auc())
}

/// Precision-recall curve for `pos_label`.
///
/// Points past the first threshold reaching full recall are dropped, the
/// remainder is reversed and closed with (recall 0, precision 1).
pub fn precision_recall_curve(
    y_true: &Array1<f64>,
    scores: &Array1<f64>,
    pos_label: f64,
) -> Result<PrecisionRecallCurve> {
    let counts = binary_counts(y_true, scores, pos_label)?;
    let total_tp = counts.tps.last().copied().unwrap_or(0.0);
    if total_tp == 0.0 {
        return Err(MetrixError::MetricError(
            "precision-recall curve needs at least one positive sample".to_string(),
        ));
    }

    let last = counts
        .tps
        .iter()
        .position(|&tp| tp >= total_tp)
        .unwrap_or(counts.tps.len() - 1);

    let mut precision = Vec::with_capacity(last + 2);
    let mut recall = Vec::with_capacity(last + 2);
    let mut thresholds = Vec::with_capacity(last + 1);
    for k in (0..=last).rev() {
        let tp = counts.tps[k];
        let fp = counts.fps[k];
        precision.push(tp / (tp + fp));
        recall.push(tp / total_tp);
        thresholds.push(counts.thresholds[k]);
    }
    precision.push(1.0);
    recall.push(0.0);

    Ok(PrecisionRecallCurve {
        precision,
        recall,
        thresholds,
    })
}

/// Trapezoidal area under y(x); x must be monotonic
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    let area: f64 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum();
    area.abs()
}

/// Histogram of values in [0, 1] with equal-width bins
pub fn probability_histogram(values: &Array1<f64>, n_bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_bins.max(1)];
    let last = counts.len() - 1;
    for &v in values {
        let bin = ((v.clamp(0.0, 1.0) * counts.len() as f64) as usize).min(last);
        counts[bin] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roc_curve_points() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let s = array![0.1, 0.4, 0.35, 0.8];
        let roc = roc_curve(&y, &s, 1.0).unwrap();

        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(roc.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(roc.thresholds[0].is_infinite());
        assert_eq!(&roc.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
        assert!((roc.auc() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_ties_collapse() {
        let y = array![0.0, 1.0, 0.0, 1.0];
        let s = array![0.5, 0.5, 0.5, 0.5];
        let roc = roc_curve(&y, &s, 1.0).unwrap();
        assert_eq!(roc.fpr, vec![0.0, 1.0]);
        assert!((roc.auc() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_class_curve() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p0 = array![0.9, 0.6, 0.65, 0.2];
        let roc = roc_curve(&y, &p0, 0.0).unwrap();
        assert!((roc.auc() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_auc_is_error() {
        let y = array![1.0, 1.0, 1.0];
        let s = array![0.2, 0.5, 0.9];
        assert!(roc_auc_score(&y, &s).is_err());
    }

    #[test]
    fn test_precision_recall_curve() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let s = array![0.1, 0.4, 0.35, 0.8];
        let pr = precision_recall_curve(&y, &s, 1.0).unwrap();

        assert_eq!(pr.recall, vec![1.0, 0.5, 0.5, 0.0]);
        assert_eq!(pr.thresholds, vec![0.35, 0.4, 0.8]);
        assert!((pr.precision[0] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(pr.precision[1..], [0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_negative_class_precision_recall() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p0 = array![0.9, 0.6, 0.65, 0.2];
        let pr = precision_recall_curve(&y, &p0, 0.0).unwrap();

        assert_eq!(pr.recall, vec![1.0, 0.5, 0.5, 0.0]);
        assert_eq!(pr.thresholds, vec![0.6, 0.65, 0.9]);
        assert!((pr.precision[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!(precision_recall_curve(&array![1.0, 1.0], &array![0.3, 0.4], 0.0).is_err());
    }

    #[test]
    fn test_operating_point() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let s = array![0.1, 0.4, 0.35, 0.8];
        let roc = roc_curve(&y, &s, 1.0).unwrap();

        // scores above 0.5: only 0.8
        assert_eq!(roc.operating_point(0.5), (0.5, 1.0));
        // above 0.3: 0.8, 0.4 and 0.35
        assert_eq!(roc.operating_point(0.3), (1.0, 0.5));
        assert_eq!(roc.operating_point(0.9), (0.0, 1.0));
        assert_eq!(roc.operating_point(0.0), (1.0, 0.0));
    }

    #[test]
    fn test_auc_trapezoid() {
        assert!((auc(&[0.0, 1.0], &[0.0, 1.0]) - 0.5).abs() < 1e-12);
        assert!((auc(&[0.0, 0.5, 1.0], &[1.0, 1.0, 1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram() {
        let values = array![0.0, 0.04, 0.5, 0.99, 1.0];
        let hist = probability_histogram(&values, 20);
        assert_eq!(hist.len(), 20);
        assert_eq!(hist[0], 2);
        assert_eq!(hist[10], 1);
        assert_eq!(hist[19], 2);
    }
}
