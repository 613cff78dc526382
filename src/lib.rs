//! Metrix ML - tree classifiers for experimental phasing success
//!
//! Predicts the binary `EP_success` outcome of crystallographic experiments
//! from data-collection and processing statistics. One run derives a feature
//! set, splits it, tunes a decision tree, bagged trees or a random forest by
//! grid or random search, refits the winner and reports on it.
//!
//! # Modules
//!
//! ## Data
//! - [`utils`] - Sample table loading
//! - [`feature_engineering`] - Feature-set derivation
//!
//! ## Models
//! - [`training`] - Trees, ensembles, splitting and cross-validation
//! - [`optimizer`] - Search spaces and the tuner
//! - [`metrics`] - Confusion statistics and curves
//!
//! ## Outputs
//! - [`report`] - Text report, charts, tree diagrams, model artifacts
//! - [`pipeline`] - End-to-end experiment
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod utils;
pub mod feature_engineering;

// Models
pub mod training;
pub mod optimizer;
pub mod metrics;

// Outputs
pub mod report;
pub mod pipeline;
pub mod cli;

pub use error::{MetrixError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{MetrixError, Result};

    // Data
    pub use crate::utils::{DataLoader, SampleTable, LABEL_COLUMN};
    pub use crate::feature_engineering::{derive_features, FeatureSet, FeatureTable};

    // Models
    pub use crate::training::{
        Classifier, CrossValidator, DecisionTree, EstimatorKind, ModelParams, Splitter, SplitMode,
        TrainedModel, TreeParams,
    };
    pub use crate::optimizer::{SearchMode, SearchSpace, Tuner, TunerConfig};
    pub use crate::metrics::{ConfusionMatrix, ConfusionMetrics};

    // Outputs
    pub use crate::report::{DotExporter, ModelArtifact, ReportLog};
    pub use crate::pipeline::{run_experiment, Experiment, ExperimentConfig, ExperimentSummary};
}
