//! Evaluation metrics for binary classifiers
//!
//! Confusion-matrix metrics are computed two ways (from the counts and from
//! the label vectors) so reports can cross-check them.

pub mod classification;
pub mod curves;

pub use classification::{
    accuracy_score, f1_score, fall_out_score, precision_score, recall_score, specificity_score,
    ConfusionMatrix, ConfusionMetrics, PredictionStats, CROSS_CHECK_TOLERANCE,
};
pub use curves::{
    auc, precision_recall_curve, probability_histogram, roc_auc_score, roc_curve,
    PrecisionRecallCurve, RocCurve,
};
