//! Held-out and cross-validated evaluation of the final model

use crate::error::{MetrixError, Result};
use crate::metrics::{
    precision_recall_curve, roc_auc_score, roc_curve, ConfusionMatrix, ConfusionMetrics,
    PrecisionRecallCurve, RocCurve,
};
use crate::report::ReportLog;
use crate::training::{CVResults, DecisionTree, Scoring};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Probability cut-offs reported for each view and class
pub const EVALUATION_THRESHOLDS: [f64; 5] = [0.6, 0.5, 0.4, 0.3, 0.2];

/// Which predictions a view holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    /// Final model on the test split
    Test,
    /// Out-of-fold predictions on the training split
    CrossValidated,
}

impl View {
    /// Label used in report lines and file names
    pub fn label(&self) -> &'static str {
        match self {
            View::Test => "test",
            View::CrossValidated => "CV",
        }
    }

    /// File-name fragment
    pub fn file_tag(&self) -> &'static str {
        match self {
            View::Test => "test_",
            View::CrossValidated => "train_CV_",
        }
    }
}

/// Predictions of one view with every statistic derived from them
#[derive(Debug, Clone)]
pub struct ViewEvaluation {
    pub view: View,
    pub y_true: Array1<f64>,
    pub y_pred: Array1<f64>,
    pub proba: Array2<f64>,
    pub confusion: ConfusionMatrix,
    /// Computed from the confusion counts
    pub manual: ConfusionMetrics,
    /// Computed from the label vectors
    pub direct: ConfusionMetrics,
    /// Positive-class ROC-AUC
    pub roc_auc: f64,
    /// Class 0 ROC-AUC, scored by the class 0 probability
    pub roc_auc_negative: f64,
}

impl ViewEvaluation {
    /// Evaluate one view; the manual and direct metrics must agree
    pub fn new(view: View, y_true: Array1<f64>, y_pred: Array1<f64>, proba: Array2<f64>) -> Result<Self> {
        if proba.nrows() != y_true.len() || proba.ncols() != 2 {
            return Err(MetrixError::ShapeError {
                expected: format!("({}, 2) probabilities", y_true.len()),
                actual: format!("{:?} probabilities", proba.dim()),
            });
        }
        let confusion = ConfusionMatrix::from_labels(&y_true, &y_pred)?;
        let manual = ConfusionMetrics::from_confusion(&confusion);
        let direct = ConfusionMetrics::from_labels(&y_true, &y_pred)?;
        manual.cross_check(&direct, view.label())?;
        let roc_auc = roc_auc_score(&y_true, &proba.column(1).to_owned())?;
        let roc_auc_negative = roc_curve(&y_true, &proba.column(0).to_owned(), 0.0)?.auc();

        Ok(Self {
            view,
            y_true,
            y_pred,
            proba,
            confusion,
            manual,
            direct,
            roc_auc,
            roc_auc_negative,
        })
    }

    pub fn positive_scores(&self) -> Array1<f64> {
        self.proba.column(1).to_owned()
    }

    pub fn negative_scores(&self) -> Array1<f64> {
        self.proba.column(0).to_owned()
    }

    pub fn roc_positive(&self) -> Result<RocCurve> {
        roc_curve(&self.y_true, &self.positive_scores(), 1.0)
    }

    /// ROC curve of class 0 scored by its own probability column
    pub fn roc_negative(&self) -> Result<RocCurve> {
        roc_curve(&self.y_true, &self.negative_scores(), 0.0)
    }

    pub fn precision_recall(&self) -> Result<PrecisionRecallCurve> {
        precision_recall_curve(&self.y_true, &self.positive_scores(), 1.0)
    }

    pub fn precision_recall_negative(&self) -> Result<PrecisionRecallCurve> {
        precision_recall_curve(&self.y_true, &self.negative_scores(), 0.0)
    }
}

fn metric_label(name: &str) -> &'static str {
    match name {
        "accuracy" => "accuracy score",
        "classification_error" => "classification error",
        "sensitivity" => "sensitivity",
        "specificity" => "specificity",
        "false_positive_rate" => "false positive rate",
        "precision" => "precision",
        _ => "F1 score",
    }
}

/// Confusion matrices, counts and the manual/direct metric pairs of both views
pub fn write_confusion_section(log: &ReportLog, views: &[&ViewEvaluation]) -> Result<()> {
    log.section("Confusion matrix")?;
    for v in views {
        let [[tn, fp], [fn_, tp]] = v.confusion.as_rows();
        log.kv(
            &format!("confusion matrix {}", v.view.label()),
            format!("[[{} {}] [{} {}]]", tn, fp, fn_, tp),
        )?;
        log.kv(&format!("TP {}", v.view.label()), tp)?;
        log.kv(&format!("TN {}", v.view.label()), tn)?;
        log.kv(&format!("FP {}", v.view.label()), fp)?;
        log.kv(&format!("FN {}", v.view.label()), fn_)?;
    }

    let first = match views.first() {
        Some(v) => v,
        None => return Ok(()),
    };
    for (k, (name, _)) in first.manual.named().iter().enumerate() {
        let label = metric_label(name);
        for v in views {
            log.kv(&format!("{} manual {}", label, v.view.label()), v.manual.named()[k].1)?;
            log.kv(&format!("{} direct {}", label, v.view.label()), v.direct.named()[k].1)?;
        }
        if *name == "false_positive_rate" {
            for v in views {
                log.kv(
                    &format!("1 - specificity {}", v.view.label()),
                    1.0 - v.manual.specificity,
                )?;
            }
        }
    }
    Ok(())
}

/// Sensitivity and specificity of both classes at each of [`EVALUATION_THRESHOLDS`]
pub fn write_threshold_section(log: &ReportLog, views: &[&ViewEvaluation]) -> Result<()> {
    log.section("Sensitivity and specificity by threshold")?;
    for v in views {
        for (class, curve) in [("1", v.roc_positive()?), ("0", v.roc_negative()?)] {
            let name = format!("{}class{}_", v.view.file_tag(), class);
            for t in EVALUATION_THRESHOLDS {
                let (sensitivity, specificity) = curve.operating_point(t);
                log.kv(&format!("Sensitivity for {} at threshold {:.2}", name, t), sensitivity)?;
                log.kv(&format!("Specificity for {} at threshold {:.2}", name, t), specificity)?;
            }
        }
    }
    Ok(())
}

fn scoring_label(scoring: Scoring) -> &'static str {
    match scoring {
        Scoring::Accuracy => "Accuracy",
        Scoring::RocAuc => "ROC_AUC",
        Scoring::Recall => "Recall",
        Scoring::Precision => "Precision",
        Scoring::F1 => "F1 score",
    }
}

/// Mean fold score of each metric, e.g. `ROC_AUC for test: 0.93`
pub fn write_scoring_lines(log: &ReportLog, name: &str, summary: &[(Scoring, CVResults)]) -> Result<()> {
    for (scoring, cv) in summary {
        log.kv(&format!("{} for {}", scoring_label(*scoring), name), cv.mean_score)?;
    }
    Ok(())
}

/// Stratified fold count for scoring a small labelled set.
///
/// Capped by the smaller class so every fold holds both classes; `None`
/// when a class has fewer than two members.
pub fn scoring_folds(y: &Array1<f64>, max_folds: usize) -> Option<usize> {
    let ones = y.iter().filter(|&&v| v == 1.0).count();
    let smaller = ones.min(y.len() - ones);
    let folds = max_folds.min(smaller);
    if folds < 2 {
        None
    } else {
        Some(folds)
    }
}

/// Mean and sample standard deviation of per-tree importances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceSpread {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub n_estimators: usize,
}

impl ImportanceSpread {
    /// Aggregate over fitted trees; the std is 0 for a single tree
    pub fn from_estimators(trees: &[&DecisionTree]) -> Result<Self> {
        let rows: Vec<&Array1<f64>> = trees
            .iter()
            .map(|t| t.feature_importances().ok_or(MetrixError::ModelNotFitted))
            .collect::<Result<_>>()?;
        let first = rows.first().ok_or(MetrixError::ModelNotFitted)?;
        let n_features = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; n_features];
        for row in &rows {
            for (m, v) in means.iter_mut().zip(row.iter()) {
                *m += v / n;
            }
        }
        let stds = (0..n_features)
            .map(|j| {
                if rows.len() < 2 {
                    return 0.0;
                }
                let ss: f64 = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum();
                (ss / (n - 1.0)).sqrt()
            })
            .collect();

        Ok(Self {
            means,
            stds,
            n_estimators: rows.len(),
        })
    }
}

/// `(importance, name)` pairs, largest first
pub fn ranked_importances(names: &[String], importances: &[f64]) -> Vec<(f64, String)> {
    let mut ranked: Vec<(f64, String)> = importances
        .iter()
        .copied()
        .zip(names.iter().cloned())
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    ranked
}

pub fn format_ranked(ranked: &[(f64, String)]) -> String {
    let items: Vec<String> = ranked
        .iter()
        .map(|(v, name)| format!("({:.6}, '{}')", v, name))
        .collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::TreeParams;
    use ndarray::array;

    fn fitted(x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> DecisionTree {
        let mut tree = DecisionTree::new(TreeParams::default().with_max_depth(2)).with_random_state(seed);
        tree.fit(x, y).unwrap();
        tree
    }

    #[test]
    fn test_view_counts_cover_samples() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let proba = array![[0.9, 0.1], [0.4, 0.6], [0.3, 0.7], [0.8, 0.2], [0.1, 0.9]];
        let y_pred = array![0.0, 1.0, 1.0, 0.0, 1.0];

        let eval = ViewEvaluation::new(View::Test, y_true, y_pred, proba).unwrap();
        let cm = &eval.confusion;
        assert_eq!(cm.tp + cm.tn + cm.fp + cm.fn_, 5);
        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (2, 1, 1, 1));
        assert!((eval.manual.accuracy - 0.6).abs() < 1e-12);
        assert!(eval.roc_auc > 0.5);
        assert_eq!(eval.roc_negative().unwrap().fpr.first(), Some(&0.0));
    }

    #[test]
    fn test_single_class_view_is_fatal() {
        let y = array![1.0, 1.0, 1.0];
        let proba = array![[0.2, 0.8], [0.3, 0.7], [0.6, 0.4]];
        let pred = array![1.0, 1.0, 0.0];
        assert!(ViewEvaluation::new(View::CrossValidated, y, pred, proba).is_err());
    }

    #[test]
    fn test_importance_spread_uses_sample_std() {
        let x = array![[1.0, 5.0], [2.0, 3.0], [3.0, 4.0], [4.0, 1.0], [5.0, 2.0], [6.0, 0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let a = fitted(&x, &y, 1);
        let b = fitted(&x, &y, 2);

        let spread = ImportanceSpread::from_estimators(&[&a, &b]).unwrap();
        assert_eq!(spread.n_estimators, 2);
        let ia = a.feature_importances().unwrap();
        let ib = b.feature_importances().unwrap();
        for j in 0..2 {
            let mean = (ia[j] + ib[j]) / 2.0;
            let std = (((ia[j] - mean).powi(2) + (ib[j] - mean).powi(2)) / 1.0).sqrt();
            assert!((spread.means[j] - mean).abs() < 1e-12);
            assert!((spread.stds[j] - std).abs() < 1e-12);
        }

        let single = ImportanceSpread::from_estimators(&[&a]).unwrap();
        assert!(single.stds.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_ranking() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = ranked_importances(&names, &[0.2, 0.5, 0.3]);
        let order: Vec<&str> = ranked.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert_eq!(format_ranked(&ranked[..1]), "[(0.500000, 'b')]");
    }

    #[test]
    fn test_negative_class_outputs() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let proba = array![[0.9, 0.1], [0.6, 0.4], [0.65, 0.35], [0.2, 0.8]];
        let y_pred = array![0.0, 0.0, 0.0, 1.0];

        let eval = ViewEvaluation::new(View::Test, y_true, y_pred, proba).unwrap();
        assert!((eval.roc_auc - 0.75).abs() < 1e-12);
        assert!((eval.roc_auc_negative - 0.75).abs() < 1e-12);
        let pr0 = eval.precision_recall_negative().unwrap();
        assert_eq!(pr0.recall.first(), Some(&1.0));
        assert_ne!(pr0, eval.precision_recall().unwrap());
    }

    #[test]
    fn test_threshold_section_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::open(dir.path(), "r.txt").unwrap();
        let y = array![0.0, 0.0, 1.0, 1.0];
        let proba = array![[0.9, 0.1], [0.6, 0.4], [0.65, 0.35], [0.2, 0.8]];
        let pred = array![0.0, 0.0, 0.0, 1.0];
        let test = ViewEvaluation::new(View::Test, y.clone(), pred.clone(), proba.clone()).unwrap();
        let cv = ViewEvaluation::new(View::CrossValidated, y, pred, proba).unwrap();

        write_threshold_section(&log, &[&test, &cv]).unwrap();
        let text = log.read().unwrap();
        for line in [
            "Sensitivity for test_class1_ at threshold 0.50: 0.5",
            "Specificity for test_class1_ at threshold 0.50: 1",
            "Sensitivity for test_class1_ at threshold 0.30: 1",
            "Specificity for test_class1_ at threshold 0.30: 0.5",
            "Sensitivity for train_CV_class0_ at threshold 0.60: 0.5",
            "Specificity for train_CV_class0_ at threshold 0.20: 0.5",
        ] {
            assert!(text.contains(line), "missing '{}'", line);
        }
        assert_eq!(text.matches("Sensitivity for ").count(), 2 * 2 * EVALUATION_THRESHOLDS.len());
    }

    #[test]
    fn test_scoring_lines_and_folds() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::open(dir.path(), "r.txt").unwrap();
        let summary = vec![
            (Scoring::RocAuc, CVResults::from_scores(vec![0.5, 1.0])),
            (Scoring::F1, CVResults::from_scores(vec![0.25, 0.75])),
        ];
        write_scoring_lines(&log, "test", &summary).unwrap();
        let text = log.read().unwrap();
        assert!(text.contains("ROC_AUC for test: 0.75"));
        assert!(text.contains("F1 score for test: 0.5"));

        assert_eq!(scoring_folds(&array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0], 5), Some(4));
        assert_eq!(scoring_folds(&Array1::zeros(20), 5), None);
        assert_eq!(scoring_folds(&array![0.0, 1.0, 0.0, 0.0], 5), None);
        assert_eq!(scoring_folds(&Array1::from_iter((0..40).map(|i| (i % 2) as f64)), 5), Some(5));
    }

    #[test]
    fn test_confusion_section_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::open(dir.path(), "r.txt").unwrap();
        let y = array![0.0, 1.0, 0.0, 1.0];
        let proba = array![[0.8, 0.2], [0.3, 0.7], [0.6, 0.4], [0.4, 0.6]];
        let pred = array![0.0, 1.0, 0.0, 1.0];
        let test = ViewEvaluation::new(View::Test, y.clone(), pred.clone(), proba.clone()).unwrap();
        let cv = ViewEvaluation::new(View::CrossValidated, y, pred, proba).unwrap();

        write_confusion_section(&log, &[&test, &cv]).unwrap();
        let text = log.read().unwrap();
        for line in [
            "confusion matrix test: [[2 0] [0 2]]",
            "TP CV: 2",
            "accuracy score manual test: 1",
            "sensitivity direct CV: 1",
            "specificity manual CV: 1",
            "false positive rate manual test: 0",
            "1 - specificity test: 0",
            "F1 score direct test: 1",
        ] {
            assert!(text.contains(line), "missing '{}'", line);
        }
    }
}
