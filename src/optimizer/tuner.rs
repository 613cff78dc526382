//! Cross-validated hyperparameter search

use super::config::{SearchMode, TunerConfig};
use super::params::{check_space, model_params_from_point, scoring_params};
use super::search_space::{ParamPoint, SearchSpace};
use crate::error::{MetrixError, Result};
use crate::training::{cross_val_score, CrossValidator, EstimatorKind, ModelParams, Scoring};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Result of a single candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Position in enumeration order
    pub trial_id: usize,
    /// Parameters used
    pub point: ParamPoint,
    /// Mean cross-validated accuracy
    pub value: f64,
    /// Per-fold accuracy
    pub fold_scores: Vec<f64>,
    /// Trial duration in seconds
    pub duration_secs: f64,
}

/// All trials of one search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    /// All trial results, in enumeration order
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
}

impl Study {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.and_then(|idx| self.trials.get(idx))
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    /// Add a trial result; only a strictly higher score replaces the best
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();
        let is_better = match self.best_value() {
            None => true,
            Some(best) => result.value > best,
        };
        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(result);
    }
}

/// Winning configuration of a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestParams {
    /// Winning search point
    pub point: ParamPoint,
    /// Parameters for the final fit
    pub params: ModelParams,
    /// Mean cross-validated accuracy
    pub mean_score: f64,
    /// Per-fold accuracy of the winner
    pub fold_scores: Vec<f64>,
    /// Number of candidates evaluated
    pub n_candidates: usize,
}

/// Grid or random search over one estimator's space
pub struct Tuner {
    kind: EstimatorKind,
    space: SearchSpace,
    config: TunerConfig,
}

impl Tuner {
    pub fn new(kind: EstimatorKind, space: SearchSpace, config: TunerConfig) -> Self {
        Self {
            kind,
            space,
            config,
        }
    }

    pub fn kind(&self) -> EstimatorKind {
        self.kind
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Candidates in evaluation order
    pub fn candidates(&self) -> Result<Vec<ParamPoint>> {
        match self.config.mode {
            SearchMode::Grid => self.space.grid(),
            SearchMode::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
                self.space.sample_points(self.config.n_iter, &mut rng)
            }
        }
    }

    /// Score every candidate with stratified k-fold accuracy
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Study> {
        self.config.validate()?;
        check_space(self.kind, &self.space)?;

        let start = Instant::now();
        let candidates = self.candidates()?;
        if candidates.is_empty() {
            return Err(MetrixError::ConfigError(
                "search space produced no candidates".to_string(),
            ));
        }
        let splits = CrossValidator::stratified(self.config.cv_folds).split(x.nrows(), Some(y))?;
        let default_n = self.config.default_n_estimators;

        info!(
            kind = %self.kind,
            mode = %self.config.mode,
            candidates = candidates.len(),
            folds = splits.len(),
            "Starting hyperparameter search"
        );

        let trials: Vec<TrialResult> = candidates
            .into_par_iter()
            .enumerate()
            .map(|(trial_id, point)| -> Result<TrialResult> {
                let trial_start = Instant::now();
                let params = scoring_params(self.kind, &point, default_n)?;
                let cv = cross_val_score(&params, x, y, &splits, Scoring::Accuracy)?;
                debug!(trial_id, score = cv.mean_score, "{}", point);
                Ok(TrialResult {
                    trial_id,
                    point,
                    value: cv.mean_score,
                    fold_scores: cv.scores,
                    duration_secs: trial_start.elapsed().as_secs_f64(),
                })
            })
            .collect::<Result<_>>()?;

        let mut study = Study::new();
        for trial in trials {
            study.add_trial(trial);
        }
        study.total_duration_secs = start.elapsed().as_secs_f64();
        Ok(study)
    }

    /// Run the search and resolve the winner into final-fit parameters
    pub fn tune(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<BestParams> {
        let study = self.run(x, y)?;
        let best = study
            .best_trial()
            .ok_or_else(|| MetrixError::TrainingError("no trial completed".to_string()))?;
        let params = model_params_from_point(self.kind, &best.point, self.config.default_n_estimators)?;

        info!(
            score = best.value,
            trial = best.trial_id,
            elapsed_secs = study.total_duration_secs,
            "Best parameters {}",
            best.point
        );

        Ok(BestParams {
            point: best.point.clone(),
            params,
            mean_score: best.value,
            fold_scores: best.fold_scores.clone(),
            n_candidates: study.trials.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::search_space::ParameterValue;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let n = 60;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => (i % 2) as f64 * 3.0 + (i % 5) as f64 * 0.2,
            1 => ((i * 7) % 11) as f64,
            _ => ((i * 3) % 13) as f64,
        });
        let y = (0..n).map(|i| (i % 2) as f64).collect();
        (x, y)
    }

    fn config() -> TunerConfig {
        TunerConfig::new().with_cv_folds(3)
    }

    #[test]
    fn test_study_first_max_wins() {
        let mut study = Study::new();
        for (id, v) in [0.5, 0.8, 0.8, 0.7].iter().enumerate() {
            study.add_trial(TrialResult {
                trial_id: id,
                point: ParamPoint::new(),
                value: *v,
                fold_scores: vec![*v],
                duration_secs: 0.0,
            });
        }
        assert_eq!(study.best_trial_idx, Some(1));
    }

    #[test]
    fn test_stale_best_index_is_none() {
        let study: Study = serde_json::from_str(
            r#"{"trials": [], "best_trial_idx": 3, "total_duration_secs": 0.0}"#,
        )
        .unwrap();
        assert!(study.best_trial().is_none());
        assert!(study.best_value().is_none());
    }

    #[test]
    fn test_grid_search_finds_depth() {
        let (x, y) = data();
        let space = SearchSpace::new()
            .strings("criterion", &["gini", "entropy"])
            .ints("max_depth", &[1, 3]);
        let tuner = Tuner::new(EstimatorKind::DecisionTree, space, config());

        let best = tuner.tune(&x, &y).unwrap();
        assert_eq!(best.n_candidates, 4);
        assert_eq!(best.fold_scores.len(), 3);
        assert!((best.mean_score - 1.0).abs() < 1e-12);
        // every candidate is perfect, so the first one wins
        assert_eq!(best.point.get("criterion"), Some(&ParameterValue::from("gini")));
        assert_eq!(best.point.get("max_depth"), Some(&ParameterValue::Int(1)));
    }

    #[test]
    fn test_search_is_deterministic() {
        let (x, y) = data();
        let space = SearchSpace::new()
            .randint("max_depth", 1, 4)
            .randint("min_samples_leaf", 1, 10);
        let tuner = Tuner::new(
            EstimatorKind::DecisionTree,
            space,
            config().with_mode(SearchMode::Random).with_n_iter(6),
        );
        let a = tuner.run(&x, &y).unwrap();
        let b = tuner.run(&x, &y).unwrap();
        let scores = |s: &Study| s.trials.iter().map(|t| t.value).collect::<Vec<_>>();
        assert_eq!(scores(&a), scores(&b));
        assert_eq!(a.best_trial_idx, b.best_trial_idx);
        assert_eq!(a.trials.len(), 6);
    }

    #[test]
    fn test_bagged_refit_uses_default_ensemble() {
        let (x, y) = data();
        let space = SearchSpace::new().ints("base_estimator__max_depth", &[2]);
        let tuner = Tuner::new(
            EstimatorKind::BaggedTrees,
            space,
            config().with_default_n_estimators(7),
        );
        let best = tuner.tune(&x, &y).unwrap();
        match best.params {
            ModelParams::BaggedTrees { n_estimators, .. } => assert_eq!(n_estimators, 7),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let (x, y) = data();
        let space = SearchSpace::new().ints("depth", &[2]);
        let tuner = Tuner::new(EstimatorKind::DecisionTree, space, config());
        assert!(matches!(tuner.tune(&x, &y), Err(MetrixError::ConfigError(_))));
    }
}
