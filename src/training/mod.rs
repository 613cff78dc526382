//! Model training module
//!
//! Provides the tree classifiers and the data plumbing around them:
//! - Train/test splitting (plain or stratified)
//! - Decision trees grown best-first with gini or entropy impurity
//! - Bagged decision trees and Random Forests
//! - K-fold and stratified k-fold cross-validation

pub mod bagging;
pub mod cross_validation;
pub mod decision_tree;
pub mod models;
pub mod random_forest;
pub mod split;

pub use bagging::BaggedTrees;
pub use cross_validation::{
    cross_val_predict, cross_val_score, cross_validate, CVResults, CVSplit, CVStrategy,
    CrossValidator, Scoring,
};
pub use decision_tree::{
    labels_to_classes, proba_to_labels, ClassWeight, Criterion, DecisionTree, TreeNode, TreeParams,
};
pub use models::{
    Classifier, EstimatorKind, ModelParams, TrainedModel, DEFAULT_N_ESTIMATORS, ESTIMATOR_SEED,
};
pub use random_forest::RandomForest;
pub use split::{Split, SplitMode, Splitter, SPLIT_SEED, TEST_FRACTION};
