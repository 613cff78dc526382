//! Built-in search spaces per estimator kind and search mode

use super::config::{SearchMode, TunerConfig};
use super::params::BASE_PREFIX;
use super::search_space::{Parameter, ParameterValue, SearchSpace};
use crate::training::EstimatorKind;

/// Tree grid shared by the decision-tree and bagged-tree grid searches
fn tree_grid(prefix: &str) -> SearchSpace {
    let name = |n: &str| format!("{}{}", prefix, n);
    SearchSpace::new()
        .strings(name("criterion"), &["gini", "entropy"])
        .ints(name("max_features"), &[1, 2, 4, 8, 16])
        .ints(name("min_samples_split"), &[5, 10, 15])
        .ints(name("max_depth"), &[3, 4, 5, 6])
        .ints(name("min_samples_leaf"), &[2, 4, 6])
        .ints(name("max_leaf_nodes"), &[5, 10, 15])
}

fn tree_random() -> SearchSpace {
    SearchSpace::new()
        .strings("criterion", &["gini", "entropy"])
        .randint("max_features", 2, 16)
        .randint("min_samples_split", 2, 20)
        .randint("max_depth", 5, 10)
        .randint("min_samples_leaf", 1, 20)
        .randint("max_leaf_nodes", 10, 20)
}

fn bagged_random() -> SearchSpace {
    let name = |n: &str| format!("{}{}", BASE_PREFIX, n);
    SearchSpace::new()
        .strings(name("criterion"), &["gini", "entropy"])
        .add(Parameter::discrete(
            name("class_weight"),
            vec![ParameterValue::from("balanced"), ParameterValue::None],
        ))
        .randint("n_estimators", 100, 10000)
        .randint(name("max_features"), 2, 48)
        .randint(name("min_samples_split"), 2, 20)
        .randint(name("max_depth"), 5, 10)
        .randint(name("min_samples_leaf"), 1, 20)
        .randint(name("max_leaf_nodes"), 10, 20)
}

/// Default space for an estimator and search mode
pub fn default_space(kind: EstimatorKind, mode: SearchMode) -> SearchSpace {
    match (kind, mode) {
        (EstimatorKind::DecisionTree, SearchMode::Grid) => tree_grid(""),
        (EstimatorKind::BaggedTrees, SearchMode::Grid) => tree_grid(BASE_PREFIX),
        (EstimatorKind::RandomForest, SearchMode::Grid) => SearchSpace::new()
            .strings("criterion", &["gini", "entropy"])
            .ints("n_estimators", &[100, 300])
            .ints("max_features", &[2, 4, 8])
            .ints("max_depth", &[5, 8]),
        (EstimatorKind::DecisionTree, SearchMode::Random) => tree_random(),
        (EstimatorKind::BaggedTrees, SearchMode::Random) => bagged_random(),
        (EstimatorKind::RandomForest, SearchMode::Random) => {
            tree_random().randint("n_estimators", 10, 500)
        }
    }
}

/// Default tuner settings for an estimator and search mode
pub fn default_tuner_config(kind: EstimatorKind, mode: SearchMode) -> TunerConfig {
    let config = TunerConfig::new().with_mode(mode);
    match (kind, mode) {
        (EstimatorKind::BaggedTrees, SearchMode::Random) => config.with_n_iter(500).with_cv_folds(3),
        _ => config,
    }
}
