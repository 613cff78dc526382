//! Mapping search points onto estimator parameters
//!
//! Bagged-tree spaces address the member tree with a `base_estimator__`
//! prefix and the ensemble with plain `n_estimators`. Decision trees take
//! plain tree names; random forests take plain tree names plus
//! `n_estimators`.

use super::search_space::{ParamPoint, ParameterValue, SearchSpace};
use crate::error::{MetrixError, Result};
use crate::training::{ClassWeight, Criterion, EstimatorKind, ModelParams, TreeParams};

/// Prefix routing a bagged-trees parameter to the base tree
pub const BASE_PREFIX: &str = "base_estimator__";

/// Parameter names a tree accepts
pub const TREE_PARAMS: [&str; 7] = [
    "criterion",
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "max_features",
    "max_leaf_nodes",
    "class_weight",
];

/// Where a named parameter goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Tree(&'a str),
    NEstimators,
}

/// Resolve a parameter name for an estimator kind
pub fn route(kind: EstimatorKind, name: &str) -> Result<Route<'_>> {
    let is_tree = |n: &str| TREE_PARAMS.contains(&n);
    let routed = match kind {
        EstimatorKind::DecisionTree if is_tree(name) => Some(Route::Tree(name)),
        EstimatorKind::RandomForest if is_tree(name) => Some(Route::Tree(name)),
        EstimatorKind::RandomForest if name == "n_estimators" => Some(Route::NEstimators),
        EstimatorKind::BaggedTrees if name == "n_estimators" => Some(Route::NEstimators),
        EstimatorKind::BaggedTrees => name
            .strip_prefix(BASE_PREFIX)
            .filter(|n| TREE_PARAMS.contains(n))
            .map(Route::Tree),
        _ => None,
    };
    routed.ok_or_else(|| {
        MetrixError::ConfigError(format!("unknown parameter '{}' for {}", name, kind))
    })
}

/// Reject a space containing names the estimator does not accept
pub fn check_space(kind: EstimatorKind, space: &SearchSpace) -> Result<()> {
    for name in space.param_names() {
        route(kind, &name)?;
    }
    Ok(())
}

fn invalid(name: &str, value: &ParameterValue, reason: &str) -> MetrixError {
    MetrixError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn as_count(name: &str, value: &ParameterValue) -> Result<usize> {
    match value.as_int() {
        Some(v) if v >= 0 => Ok(v as usize),
        _ => Err(invalid(name, value, "expected a non-negative integer")),
    }
}

fn as_optional_count(name: &str, value: &ParameterValue) -> Result<Option<usize>> {
    if value.is_none() {
        return Ok(None);
    }
    as_count(name, value).map(Some)
}

/// Set one tree parameter from a search value
pub fn apply_tree_param(tree: &mut TreeParams, name: &str, value: &ParameterValue) -> Result<()> {
    match name {
        "criterion" => {
            let s = value
                .as_string()
                .ok_or_else(|| invalid(name, value, "expected 'gini' or 'entropy'"))?;
            tree.criterion = s.parse::<Criterion>()?;
        }
        "class_weight" => {
            tree.class_weight = match value {
                ParameterValue::None => ClassWeight::None,
                ParameterValue::String(s) => s.parse::<ClassWeight>()?,
                ParameterValue::Int(_) => {
                    return Err(invalid(name, value, "expected 'balanced' or None"))
                }
            };
        }
        "max_depth" => tree.max_depth = as_optional_count(name, value)?,
        "max_features" => tree.max_features = as_optional_count(name, value)?,
        "max_leaf_nodes" => tree.max_leaf_nodes = as_optional_count(name, value)?,
        "min_samples_split" => tree.min_samples_split = as_count(name, value)?,
        "min_samples_leaf" => tree.min_samples_leaf = as_count(name, value)?,
        other => {
            return Err(MetrixError::ConfigError(format!(
                "unknown tree parameter '{}'",
                other
            )))
        }
    }
    Ok(())
}

/// Validated estimator parameters for a search point.
///
/// Ensembles whose point does not set `n_estimators` get `default_n_estimators`.
pub fn model_params_from_point(
    kind: EstimatorKind,
    point: &ParamPoint,
    default_n_estimators: usize,
) -> Result<ModelParams> {
    let mut tree = TreeParams::default();
    let mut n_estimators = default_n_estimators;
    for (name, value) in point.iter() {
        match route(kind, name)? {
            Route::Tree(tree_name) => apply_tree_param(&mut tree, tree_name, value)?,
            Route::NEstimators => n_estimators = as_count(name, value)?,
        }
    }

    let params = match kind {
        EstimatorKind::DecisionTree => ModelParams::DecisionTree { tree },
        EstimatorKind::BaggedTrees => ModelParams::BaggedTrees {
            base: tree,
            n_estimators,
        },
        EstimatorKind::RandomForest => ModelParams::RandomForest { tree, n_estimators },
    };
    params.validate()?;
    Ok(params)
}

/// Parameters a candidate is cross-validated with.
///
/// A bagged-trees point without `n_estimators` is scored on its base tree
/// alone; the ensemble is only assembled for the final fit.
pub fn scoring_params(kind: EstimatorKind, point: &ParamPoint, default_n_estimators: usize) -> Result<ModelParams> {
    let params = model_params_from_point(kind, point, default_n_estimators)?;
    match params {
        ModelParams::BaggedTrees { base, .. } if point.get("n_estimators").is_none() => {
            Ok(ModelParams::DecisionTree { tree: base })
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bagged_demux() {
        let point = ParamPoint::new()
            .with("base_estimator__criterion", "entropy".into())
            .with("base_estimator__max_depth", ParameterValue::Int(4))
            .with("base_estimator__class_weight", "balanced".into())
            .with("n_estimators", ParameterValue::Int(250));
        let params = model_params_from_point(EstimatorKind::BaggedTrees, &point, 100).unwrap();
        match params {
            ModelParams::BaggedTrees { base, n_estimators } => {
                assert_eq!(base.criterion, Criterion::Entropy);
                assert_eq!(base.max_depth, Some(4));
                assert_eq!(base.class_weight, ClassWeight::Balanced);
                assert_eq!(n_estimators, 250);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_names_rejected() {
        let plain = ParamPoint::new().with("max_depth", ParameterValue::Int(3));
        assert!(model_params_from_point(EstimatorKind::BaggedTrees, &plain, 100).is_err());

        let prefixed = ParamPoint::new().with("base_estimator__max_depth", ParameterValue::Int(3));
        assert!(model_params_from_point(EstimatorKind::DecisionTree, &prefixed, 100).is_err());

        let typo = ParamPoint::new().with("base_estimator__depth", ParameterValue::Int(3));
        let err = model_params_from_point(EstimatorKind::BaggedTrees, &typo, 100).unwrap_err();
        assert!(matches!(err, MetrixError::ConfigError(_)));

        let trees = ParamPoint::new().with("n_estimators", ParameterValue::Int(3));
        assert!(model_params_from_point(EstimatorKind::DecisionTree, &trees, 100).is_err());
    }

    #[test]
    fn test_none_values() {
        let point = ParamPoint::new()
            .with("max_depth", ParameterValue::None)
            .with("max_leaf_nodes", ParameterValue::None)
            .with("class_weight", ParameterValue::None);
        let params = model_params_from_point(EstimatorKind::DecisionTree, &point, 100).unwrap();
        let tree = params.tree_params();
        assert_eq!(tree.max_depth, None);
        assert_eq!(tree.max_leaf_nodes, None);
        assert_eq!(tree.class_weight, ClassWeight::None);
    }

    #[test]
    fn test_invalid_values() {
        let negative = ParamPoint::new().with("max_depth", ParameterValue::Int(-1));
        assert!(model_params_from_point(EstimatorKind::DecisionTree, &negative, 100).is_err());

        let wrong_type = ParamPoint::new().with("criterion", ParameterValue::Int(3));
        assert!(model_params_from_point(EstimatorKind::DecisionTree, &wrong_type, 100).is_err());

        let too_small = ParamPoint::new().with("min_samples_split", ParameterValue::Int(1));
        assert!(model_params_from_point(EstimatorKind::DecisionTree, &too_small, 100).is_err());
    }

    #[test]
    fn test_scoring_params_for_untuned_ensemble() {
        let point = ParamPoint::new().with("base_estimator__max_depth", ParameterValue::Int(3));
        let scored = scoring_params(EstimatorKind::BaggedTrees, &point, 100).unwrap();
        assert_eq!(scored.kind(), EstimatorKind::DecisionTree);

        let tuned = point.with("n_estimators", ParameterValue::Int(10));
        let scored = scoring_params(EstimatorKind::BaggedTrees, &tuned, 100).unwrap();
        assert_eq!(scored.kind(), EstimatorKind::BaggedTrees);
    }

    #[test]
    fn test_forest_defaults() {
        let point = ParamPoint::new().with("max_features", ParameterValue::Int(2));
        let params = model_params_from_point(EstimatorKind::RandomForest, &point, 100).unwrap();
        assert_eq!(
            params,
            ModelParams::RandomForest {
                tree: TreeParams::default().with_max_features(2),
                n_estimators: 100,
            }
        );
    }
}
