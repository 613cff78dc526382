//! Estimator kinds, validated parameters and the trained-model enum

use super::bagging::BaggedTrees;
use super::decision_tree::{proba_to_labels, DecisionTree, TreeParams};
use super::random_forest::RandomForest;
use crate::error::{MetrixError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ensemble size used when the search space does not tune it
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Seed for the final refit and for every candidate fit during tuning
pub const ESTIMATOR_SEED: u64 = 42;

/// Which estimator family to tune and train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    DecisionTree,
    BaggedTrees,
    RandomForest,
}

impl EstimatorKind {
    /// Short name used in output directories and artifact names
    pub fn short_name(&self) -> &'static str {
        match self {
            EstimatorKind::DecisionTree => "decisiontree",
            EstimatorKind::BaggedTrees => "decisiontree_bag",
            EstimatorKind::RandomForest => "randomforest",
        }
    }

    pub fn is_ensemble(&self) -> bool {
        !matches!(self, EstimatorKind::DecisionTree)
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EstimatorKind::DecisionTree => "decision-tree",
            EstimatorKind::BaggedTrees => "bagged-trees",
            EstimatorKind::RandomForest => "random-forest",
        };
        f.write_str(s)
    }
}

impl FromStr for EstimatorKind {
    type Err = MetrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "decision-tree" => Ok(EstimatorKind::DecisionTree),
            "bagged-trees" => Ok(EstimatorKind::BaggedTrees),
            "random-forest" => Ok(EstimatorKind::RandomForest),
            other => Err(MetrixError::ConfigError(format!(
                "unknown model '{}', expected decision-tree, bagged-trees or random-forest",
                other
            ))),
        }
    }
}

/// Fully resolved parameters of one estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    DecisionTree {
        tree: TreeParams,
    },
    BaggedTrees {
        base: TreeParams,
        n_estimators: usize,
    },
    RandomForest {
        tree: TreeParams,
        n_estimators: usize,
    },
}

impl ModelParams {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            ModelParams::DecisionTree { .. } => EstimatorKind::DecisionTree,
            ModelParams::BaggedTrees { .. } => EstimatorKind::BaggedTrees,
            ModelParams::RandomForest { .. } => EstimatorKind::RandomForest,
        }
    }

    /// Parameters of the (member) trees
    pub fn tree_params(&self) -> &TreeParams {
        match self {
            ModelParams::DecisionTree { tree } => tree,
            ModelParams::BaggedTrees { base, .. } => base,
            ModelParams::RandomForest { tree, .. } => tree,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.tree_params().validate()?;
        match self {
            ModelParams::BaggedTrees { n_estimators, .. }
            | ModelParams::RandomForest { n_estimators, .. }
                if *n_estimators == 0 =>
            {
                Err(MetrixError::InvalidParameter {
                    name: "n_estimators".to_string(),
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Unfitted estimator for these parameters
    pub fn build(&self, random_state: u64) -> Result<TrainedModel> {
        self.validate()?;
        let model = match self {
            ModelParams::DecisionTree { tree } => TrainedModel::DecisionTree(
                DecisionTree::new(tree.clone()).with_random_state(random_state),
            ),
            ModelParams::BaggedTrees { base, n_estimators } => TrainedModel::BaggedTrees(
                BaggedTrees::new(base.clone(), *n_estimators).with_random_state(random_state),
            ),
            ModelParams::RandomForest { tree, n_estimators } => TrainedModel::RandomForest(
                RandomForest::new(tree.clone(), *n_estimators).with_random_state(random_state),
            ),
        };
        Ok(model)
    }

    /// One-line summary for reports
    pub fn describe(&self) -> String {
        let t = self.tree_params();
        let opt = |v: Option<usize>| v.map_or("None".to_string(), |v| v.to_string());
        let tree = format!(
            "criterion={}, max_depth={}, min_samples_split={}, min_samples_leaf={}, max_features={}, max_leaf_nodes={}, class_weight={}",
            t.criterion,
            opt(t.max_depth),
            t.min_samples_split,
            t.min_samples_leaf,
            opt(t.max_features),
            opt(t.max_leaf_nodes),
            t.class_weight
        );
        match self {
            ModelParams::DecisionTree { .. } => format!("DecisionTree({})", tree),
            ModelParams::BaggedTrees { n_estimators, .. } => {
                format!("BaggedTrees(n_estimators={}, base=DecisionTree({}))", n_estimators, tree)
            }
            ModelParams::RandomForest { n_estimators, .. } => {
                format!("RandomForest(n_estimators={}, {})", n_estimators, tree)
            }
        }
    }
}

/// Common interface of the tree classifiers
pub trait Classifier: Send + Sync {
    /// Fit on labels in {0, 1}
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Class probabilities, columns ordered by class
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predicted labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(proba_to_labels(&self.predict_proba(x)?))
    }

    /// Impurity importances of the whole model
    fn feature_importances(&self) -> Result<Array1<f64>>;

    /// Individual trees (a single tree yields itself)
    fn estimators(&self) -> Vec<&DecisionTree>;
}

/// A fitted (or fit-ready) estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum TrainedModel {
    DecisionTree(DecisionTree),
    BaggedTrees(BaggedTrees),
    RandomForest(RandomForest),
}

impl TrainedModel {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            TrainedModel::DecisionTree(_) => EstimatorKind::DecisionTree,
            TrainedModel::BaggedTrees(_) => EstimatorKind::BaggedTrees,
            TrainedModel::RandomForest(_) => EstimatorKind::RandomForest,
        }
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            TrainedModel::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::BaggedTrees(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::RandomForest(m) => m.fit(x, y).map(|_| ()),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            TrainedModel::DecisionTree(m) => m.predict_proba(x),
            TrainedModel::BaggedTrees(m) => m.predict_proba(x),
            TrainedModel::RandomForest(m) => m.predict_proba(x),
        }
    }

    fn feature_importances(&self) -> Result<Array1<f64>> {
        match self {
            TrainedModel::DecisionTree(m) => m
                .feature_importances()
                .cloned()
                .ok_or(MetrixError::ModelNotFitted),
            TrainedModel::BaggedTrees(m) => m.feature_importances(),
            TrainedModel::RandomForest(m) => m.feature_importances(),
        }
    }

    fn estimators(&self) -> Vec<&DecisionTree> {
        match self {
            TrainedModel::DecisionTree(m) => vec![m],
            TrainedModel::BaggedTrees(m) => m.estimators().iter().collect(),
            TrainedModel::RandomForest(m) => m.estimators().iter().collect(),
        }
    }
}
