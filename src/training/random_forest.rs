//! Random forest: bagged trees with per-split feature sampling

use super::bagging::{average_proba, fit_bootstrap_members, mean_importances};
use super::decision_tree::{proba_to_labels, DecisionTree, TreeParams};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Parameters of every member tree; `max_features: None` means sqrt
    pub params: TreeParams,
    /// Number of trees
    pub n_estimators: usize,
    /// Seed for bootstrap draws and feature sampling
    pub random_state: u64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(TreeParams::default(), 100)
    }
}

impl RandomForest {
    /// Create an unfitted forest
    pub fn new(params: TreeParams, n_estimators: usize) -> Self {
        Self {
            params,
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

    /// Member parameters with the feature-sampling default resolved
    fn member_params(&self, n_features: usize) -> TreeParams {
        let mut params = self.params.clone();
        if params.max_features.is_none() {
            params.max_features = Some(((n_features as f64).sqrt() as usize).max(1));
        }
        params
    }

    /// Fit the forest
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let params = self.member_params(x.ncols());
        self.trees = fit_bootstrap_members(&params, self.n_estimators, self.random_state, x, y)?;
        self.n_features = x.ncols();
        Ok(self)
    }

    /// Mean of tree probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        average_proba(&self.trees, x)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(proba_to_labels(&self.predict_proba(x)?))
    }

    /// Fitted trees
    pub fn estimators(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean of tree importances
    pub fn feature_importances(&self) -> Result<Array1<f64>> {
        mean_importances(&self.trees, self.n_features)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier() {
        let x = array![
            [0.0, 0.0, 5.0, 1.0],
            [0.1, 0.1, 4.0, 0.0],
            [0.2, 0.2, 6.0, 1.0],
            [1.0, 1.0, 5.5, 0.0],
            [1.1, 1.1, 4.5, 1.0],
            [1.2, 1.2, 5.2, 0.0]
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = RandomForest::new(TreeParams::default(), 25).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.n_trees(), 25);
        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;
        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_sqrt_default() {
        let rf = RandomForest::default();
        assert_eq!(rf.member_params(16).max_features, Some(4));
        assert_eq!(rf.member_params(1).max_features, Some(1));

        let fixed = RandomForest::new(TreeParams::default().with_max_features(7), 10);
        assert_eq!(fixed.member_params(16).max_features, Some(7));
    }

    #[test]
    fn test_predict_proba_shape() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [0.2, 0.1], [0.9, 1.1]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut rf = RandomForest::new(TreeParams::default(), 10).with_random_state(42);
        rf.fit(&x, &y).unwrap();
        let proba = rf.predict_proba(&x).unwrap();

        assert_eq!(proba.dim(), (4, 2));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }
}
