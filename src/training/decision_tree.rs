//! Binary classification tree (CART)
//!
//! Nodes live in a flat arena and are grown best-first: the open leaf with the
//! largest weighted impurity decrease is split next, so `max_leaf_nodes` keeps
//! the most useful splits. Every node stores its weighted class totals, which
//! is what `predict_proba` reads at the leaves.

use crate::error::{MetrixError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of label classes (binary outcome)
pub const N_CLASSES: usize = 2;

/// Two feature values closer than this are treated as equal when splitting
const FEATURE_THRESHOLD: f64 = 1e-7;

/// Impurity criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy (base 2)
    Entropy,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        }
    }

    /// Impurity of a node with the given weighted class totals
    pub fn impurity(&self, value: &[f64; N_CLASSES]) -> f64 {
        let total: f64 = value.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => 1.0 - value.iter().map(|c| (c / total).powi(2)).sum::<f64>(),
            Criterion::Entropy => -value
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|c| {
                    let p = c / total;
                    p * p.log2()
                })
                .sum::<f64>(),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = MetrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            other => Err(MetrixError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected 'gini' or 'entropy'".to_string(),
            }),
        }
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Every sample weighs 1
    #[default]
    None,
    /// Weights inversely proportional to class frequency
    Balanced,
}

impl ClassWeight {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassWeight::None => "none",
            ClassWeight::Balanced => "balanced",
        }
    }
}

impl fmt::Display for ClassWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassWeight {
    type Err = MetrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "balanced" => Ok(ClassWeight::Balanced),
            "none" | "None" => Ok(ClassWeight::None),
            other => Err(MetrixError::InvalidParameter {
                name: "class_weight".to_string(),
                value: other.to_string(),
                reason: "expected 'balanced' or 'none'".to_string(),
            }),
        }
    }
}

/// Hyperparameters of a single tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Impurity criterion
    pub criterion: Criterion,
    /// Maximum depth (edges from the root); unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split
    pub min_samples_split: usize,
    /// Minimum samples in each child
    pub min_samples_leaf: usize,
    /// Features drawn per split; all when `None`, clamped to the feature count
    pub max_features: Option<usize>,
    /// Maximum number of leaves; unlimited when `None`
    pub max_leaf_nodes: Option<usize>,
    /// Class weighting
    pub class_weight: ClassWeight,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            max_leaf_nodes: None,
            class_weight: ClassWeight::None,
        }
    }
}

impl TreeParams {
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n);
        self
    }

    pub fn with_max_leaf_nodes(mut self, n: usize) -> Self {
        self.max_leaf_nodes = Some(n);
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Reject values no tree can be grown with
    pub fn validate(&self) -> Result<()> {
        fn invalid(name: &str, value: usize, reason: &str) -> MetrixError {
            MetrixError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.min_samples_split < 2 {
            return Err(invalid("min_samples_split", self.min_samples_split, "must be at least 2"));
        }
        if self.min_samples_leaf < 1 {
            return Err(invalid("min_samples_leaf", self.min_samples_leaf, "must be at least 1"));
        }
        if let Some(d) = self.max_depth {
            if d < 1 {
                return Err(invalid("max_depth", d, "must be at least 1"));
            }
        }
        if let Some(f) = self.max_features {
            if f < 1 {
                return Err(invalid("max_features", f, "must be at least 1"));
            }
        }
        if let Some(l) = self.max_leaf_nodes {
            if l < 2 {
                return Err(invalid("max_leaf_nodes", l, "must be at least 2"));
            }
        }
        Ok(())
    }
}

/// Arena node; children are indices into the node list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: [f64; N_CLASSES],
        n_samples: usize,
        impurity: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        value: [f64; N_CLASSES],
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    /// Weighted class totals
    pub fn value(&self) -> &[f64; N_CLASSES] {
        match self {
            TreeNode::Leaf { value, .. } | TreeNode::Split { value, .. } => value,
        }
    }

    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    pub fn impurity(&self) -> f64 {
        match self {
            TreeNode::Leaf { impurity, .. } | TreeNode::Split { impurity, .. } => *impurity,
        }
    }

    /// Class probabilities at this node
    pub fn proba(&self) -> [f64; N_CLASSES] {
        let value = self.value();
        let total: f64 = value.iter().sum();
        if total > 0.0 {
            [value[0] / total, value[1] / total]
        } else {
            [0.5, 0.5]
        }
    }
}

#[derive(Debug, Clone)]
struct SplitChoice {
    feature: usize,
    threshold: f64,
    /// Weighted impurity decrease: w * i - w_l * i_l - w_r * i_r
    gain: f64,
}

/// An open leaf waiting to be split
struct Candidate {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: Option<SplitChoice>,
}

/// Read-only view of the training data shared by the split search
struct FitData<'a> {
    x: &'a Array2<f64>,
    class: Vec<usize>,
    weight: Vec<f64>,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Hyperparameters
    pub params: TreeParams,
    /// Seed for per-split feature sampling
    pub random_state: u64,
    nodes: Vec<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(TreeParams::default())
    }
}

impl DecisionTree {
    /// Create an unfitted tree
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            random_state: 0,
            nodes: Vec::new(),
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set the seed used for feature sampling
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on labels in {0, 1}
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.fit_rows(x, y, &(0..x.nrows()).collect::<Vec<_>>())
    }

    /// Fit on a multiset of row indices (repeats allowed, as in a bootstrap draw)
    pub fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Result<&mut Self> {
        self.params.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(MetrixError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if rows.is_empty() || n_features == 0 {
            return Err(MetrixError::TrainingError(
                "cannot fit a tree on an empty sample".to_string(),
            ));
        }

        let class = labels_to_classes(y)?;
        let weight = self.sample_weights(&class, rows);
        let data = FitData { x, class, weight };

        self.n_features = n_features;
        self.nodes.clear();
        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let root_value = data.class_totals(rows);
        let root_impurity = self.params.criterion.impurity(&root_value);
        self.nodes.push(TreeNode::Leaf {
            value: root_value,
            n_samples: rows.len(),
            impurity: root_impurity,
        });

        let root_split = self.find_split(&data, rows, 0, &root_value, root_impurity, &mut rng);
        let mut frontier = vec![Candidate {
            node: 0,
            rows: rows.to_vec(),
            depth: 0,
            split: root_split,
        }];
        let mut n_leaves = 1usize;

        while self.params.max_leaf_nodes.map_or(true, |max| n_leaves < max) {
            // largest gain first, earliest candidate on ties
            let mut pick: Option<(usize, f64)> = None;
            for (i, cand) in frontier.iter().enumerate() {
                if let Some(split) = &cand.split {
                    if pick.map_or(true, |(_, best)| split.gain > best) {
                        pick = Some((i, split.gain));
                    }
                }
            }
            let Some((pick_idx, _)) = pick else { break };

            let cand = frontier.remove(pick_idx);
            let Some(split) = cand.split else { break };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = cand
                .rows
                .iter()
                .partition(|&&r| x[[r, split.feature]] <= split.threshold);

            importances[split.feature] += split.gain;

            let mut children = [0usize; 2];
            for (slot, child_rows) in [&left_rows, &right_rows].into_iter().enumerate() {
                let value = data.class_totals(child_rows);
                let impurity = self.params.criterion.impurity(&value);
                let node = self.nodes.len();
                self.nodes.push(TreeNode::Leaf {
                    value,
                    n_samples: child_rows.len(),
                    impurity,
                });
                children[slot] = node;
                let child_split =
                    self.find_split(&data, child_rows, cand.depth + 1, &value, impurity, &mut rng);
                frontier.push(Candidate {
                    node,
                    rows: child_rows.clone(),
                    depth: cand.depth + 1,
                    split: child_split,
                });
            }

            let value = *self.nodes[cand.node].value();
            let impurity = self.nodes[cand.node].impurity();
            self.nodes[cand.node] = TreeNode::Split {
                feature_idx: split.feature,
                threshold: split.threshold,
                left: children[0],
                right: children[1],
                value,
                n_samples: cand.rows.len(),
                impurity,
            };
            n_leaves += 1;
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn sample_weights(&self, class: &[usize], rows: &[usize]) -> Vec<f64> {
        let mut weight = vec![1.0; class.len()];
        if self.params.class_weight == ClassWeight::Balanced {
            let mut counts = [0usize; N_CLASSES];
            for &r in rows {
                counts[class[r]] += 1;
            }
            let n = rows.len() as f64;
            let per_class: Vec<f64> = counts
                .iter()
                .map(|&c| if c > 0 { n / (N_CLASSES as f64 * c as f64) } else { 0.0 })
                .collect();
            for (w, &c) in weight.iter_mut().zip(class) {
                *w = per_class[c];
            }
        }
        weight
    }

    fn find_split(
        &self,
        data: &FitData<'_>,
        rows: &[usize],
        depth: usize,
        value: &[f64; N_CLASSES],
        impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitChoice> {
        let n = rows.len();
        let p = &self.params;
        if n < p.min_samples_split
            || n < 2 * p.min_samples_leaf
            || p.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12
        {
            return None;
        }

        let k = p.max_features.unwrap_or(self.n_features).clamp(1, self.n_features);
        let features: Vec<usize> = if k < self.n_features {
            let mut drawn = index::sample(rng, self.n_features, k).into_vec();
            drawn.sort_unstable();
            drawn
        } else {
            (0..self.n_features).collect()
        };

        let per_feature: Vec<Option<SplitChoice>> = features
            .par_iter()
            .map(|&f| self.best_split_on_feature(data, rows, f, value, impurity))
            .collect();

        let mut best: Option<SplitChoice> = None;
        for choice in per_feature.into_iter().flatten() {
            if best.as_ref().map_or(true, |b| choice.gain > b.gain) {
                best = Some(choice);
            }
        }
        best.filter(|b| b.gain > 0.0)
    }

    fn best_split_on_feature(
        &self,
        data: &FitData<'_>,
        rows: &[usize],
        feature: usize,
        parent: &[f64; N_CLASSES],
        parent_impurity: f64,
    ) -> Option<SplitChoice> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf;
        let criterion = self.params.criterion;

        let mut order: Vec<(f64, usize)> = rows.iter().map(|&r| (data.x[[r, feature]], r)).collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let parent_weight: f64 = parent.iter().sum();
        let parent_term = parent_weight * parent_impurity;
        let mut left = [0.0; N_CLASSES];
        let mut best: Option<SplitChoice> = None;

        for i in 0..n - 1 {
            let (v, r) = order[i];
            left[data.class[r]] += data.weight[r];

            let n_left = i + 1;
            if n_left < min_leaf || n - n_left < min_leaf {
                continue;
            }
            let next = order[i + 1].0;
            if next <= v + FEATURE_THRESHOLD {
                continue;
            }

            let right = [(parent[0] - left[0]).max(0.0), (parent[1] - left[1]).max(0.0)];
            let w_left: f64 = left.iter().sum();
            let w_right: f64 = right.iter().sum();
            let gain = parent_term
                - w_left * criterion.impurity(&left)
                - w_right * criterion.impurity(&right);

            if best.as_ref().map_or(true, |b| gain > b.gain) {
                let mut threshold = v / 2.0 + next / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = v;
                }
                best = Some(SplitChoice {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
        best
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(MetrixError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(MetrixError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    fn leaf_for(&self, sample: ArrayView1<'_, f64>) -> &TreeNode {
        let mut node = &self.nodes[0];
        while let TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } = node
        {
            node = if sample[*feature_idx] <= *threshold {
                &self.nodes[*left]
            } else {
                &self.nodes[*right]
            };
        }
        node
    }

    /// Class probabilities, one row per sample, columns ordered by class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(x)?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), N_CLASSES));
        for (i, row) in x.rows().into_iter().enumerate() {
            let p = self.leaf_for(row).proba();
            proba[[i, 0]] = p[0];
            proba[[i, 1]] = p[1];
        }
        Ok(proba)
    }

    /// Predicted labels (0.0 / 1.0)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(proba_to_labels(&self.predict_proba(x)?))
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Node arena; index 0 is the root
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Longest root-to-leaf path, in edges
    pub fn get_depth(&self) -> usize {
        fn depth(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth(nodes, *left).max(depth(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth(&self.nodes, 0)
        }
    }

    pub fn get_n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

impl FitData<'_> {
    fn class_totals(&self, rows: &[usize]) -> [f64; N_CLASSES] {
        let mut value = [0.0; N_CLASSES];
        for &r in rows {
            value[self.class[r]] += self.weight[r];
        }
        value
    }
}

/// Map a label vector to class indices; only 0 and 1 are accepted
pub fn labels_to_classes(y: &Array1<f64>) -> Result<Vec<usize>> {
    y.iter()
        .enumerate()
        .map(|(i, &v)| {
            if v == 0.0 {
                Ok(0)
            } else if v == 1.0 {
                Ok(1)
            } else {
                Err(MetrixError::ValidationError(format!(
                    "label at row {} is {}, expected 0 or 1",
                    i, v
                )))
            }
        })
        .collect()
}

/// Arg-max over probability columns; ties go to class 0
pub fn proba_to_labels(proba: &Array2<f64>) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| if row[1] > row[0] { 1.0 } else { 0.0 })
        .collect()
}
