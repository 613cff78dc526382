//! Run outputs: text report, charts, tree diagrams and model artifacts

pub mod artifact;
pub mod charts;
pub mod log;
pub mod tree_render;

pub use artifact::{ModelArtifact, ARTIFACT_TIME_FORMAT};
pub use charts::{
    confusion_heatmap, importance_bars, precision_recall_vs_threshold, probability_hist,
    roc_chart, HISTOGRAM_BINS,
};
pub use log::ReportLog;
pub use tree_render::{escape_dot, render_png, DotExporter};
