//! Bootstrap-aggregated decision trees
//!
//! Each member tree is fit on a bootstrap draw of the training rows and the
//! ensemble averages member probabilities.

use super::decision_tree::{DecisionTree, TreeParams, N_CLASSES};
use crate::error::{MetrixError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggedTrees {
    /// Parameters of every member tree
    pub base: TreeParams,
    /// Number of member trees
    pub n_estimators: usize,
    /// Seed for bootstrap draws and member seeds
    pub random_state: u64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl BaggedTrees {
    /// Create an unfitted ensemble
    pub fn new(base: TreeParams, n_estimators: usize) -> Self {
        Self {
            base,
            n_estimators,
            random_state: 0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit every member on its own bootstrap draw
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.trees = fit_bootstrap_members(&self.base, self.n_estimators, self.random_state, x, y)?;
        self.n_features = x.ncols();
        Ok(self)
    }

    /// Mean of member probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        average_proba(&self.trees, x)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(super::decision_tree::proba_to_labels(&self.predict_proba(x)?))
    }

    /// Fitted member trees
    pub fn estimators(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean of member importances
    pub fn feature_importances(&self) -> Result<Array1<f64>> {
        mean_importances(&self.trees, self.n_features)
    }
}

/// Fit `n_estimators` trees on bootstrap draws.
///
/// Member seeds come from one master generator, so the fitted ensemble only
/// depends on `random_state`; members are fit in parallel and collected in
/// order.
pub(crate) fn fit_bootstrap_members(
    params: &TreeParams,
    n_estimators: usize,
    random_state: u64,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<Vec<DecisionTree>> {
    if n_estimators == 0 {
        return Err(MetrixError::InvalidParameter {
            name: "n_estimators".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    params.validate()?;

    let n_samples = x.nrows();
    if n_samples == 0 {
        return Err(MetrixError::TrainingError("empty training set".to_string()));
    }

    let mut master = ChaCha8Rng::seed_from_u64(random_state);
    let member_seeds: Vec<u64> = (0..n_estimators).map(|_| master.gen()).collect();

    member_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            let mut tree = DecisionTree::new(params.clone()).with_random_state(rng.gen());
            tree.fit_rows(x, y, &rows)?;
            Ok(tree)
        })
        .collect()
}

/// Average member probabilities
pub(crate) fn average_proba(trees: &[DecisionTree], x: &Array2<f64>) -> Result<Array2<f64>> {
    if trees.is_empty() {
        return Err(MetrixError::ModelNotFitted);
    }
    let mut sum = Array2::<f64>::zeros((x.nrows(), N_CLASSES));
    for tree in trees {
        sum += &tree.predict_proba(x)?;
    }
    Ok(sum / trees.len() as f64)
}

/// Mean of member importances
pub(crate) fn mean_importances(trees: &[DecisionTree], n_features: usize) -> Result<Array1<f64>> {
    if trees.is_empty() {
        return Err(MetrixError::ModelNotFitted);
    }
    let mut sum = Array1::<f64>::zeros(n_features);
    for tree in trees {
        if let Some(imp) = tree.feature_importances() {
            sum += imp;
        }
    }
    Ok(sum / trees.len() as f64)
}
