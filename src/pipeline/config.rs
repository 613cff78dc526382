//! Experiment configuration

use crate::error::{MetrixError, Result};
use crate::feature_engineering::FeatureSet;
use crate::optimizer::{default_space, default_tuner_config, params, SearchMode, SearchSpace, TunerConfig};
use crate::training::{EstimatorKind, SplitMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Feature set run when none is requested
pub const DEFAULT_FEATURE_SET: &str = "prot_screen_trans";

/// Everything one invocation needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Sample table (CSV or TSV)
    pub input: Option<PathBuf>,
    /// Root of the output tree
    pub outdir: PathBuf,
    /// Feature sets to run, in order
    pub feature_sets: Vec<String>,
    /// Estimator family
    pub model: EstimatorKind,
    /// Grid or random search
    pub search: SearchMode,
    /// Overrides the preset number of random candidates
    pub n_iter: Option<usize>,
    /// Overrides the preset number of cross-validation folds
    pub cv_folds: Option<usize>,
    /// Overrides the random-search seed
    pub random_state: Option<u64>,
    /// Held-out split strategy
    pub split: SplitMode,
    /// Render DOT files to PNG
    pub render_trees: bool,
    /// Graphviz executable
    pub dot_program: String,
    /// Replaces the preset search space
    pub space: Option<SearchSpace>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            input: None,
            outdir: PathBuf::from("."),
            feature_sets: vec![DEFAULT_FEATURE_SET.to_string()],
            model: EstimatorKind::BaggedTrees,
            search: SearchMode::Grid,
            n_iter: None,
            cv_folds: None,
            random_state: None,
            split: SplitMode::Plain,
            render_trees: true,
            dot_program: "dot".to_string(),
            space: None,
        }
    }
}

impl ExperimentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration; absent keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            MetrixError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            MetrixError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_outdir(mut self, outdir: impl Into<PathBuf>) -> Self {
        self.outdir = outdir.into();
        self
    }

    pub fn with_feature_sets(mut self, sets: Vec<String>) -> Self {
        self.feature_sets = sets;
        self
    }

    pub fn with_model(mut self, model: EstimatorKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_search(mut self, search: SearchMode) -> Self {
        self.search = search;
        self
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = Some(n_iter);
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = Some(folds);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_split(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    pub fn with_render_trees(mut self, render: bool) -> Self {
        self.render_trees = render;
        self
    }

    pub fn with_dot_program(mut self, program: impl Into<String>) -> Self {
        self.dot_program = program.into();
        self
    }

    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = Some(space);
        self
    }

    /// Preset tuner settings with the configured overrides applied
    pub fn tuner_config(&self) -> TunerConfig {
        let mut config = default_tuner_config(self.model, self.search);
        if let Some(n) = self.n_iter {
            config = config.with_n_iter(n);
        }
        if let Some(k) = self.cv_folds {
            config = config.with_cv_folds(k);
        }
        if let Some(seed) = self.random_state {
            config = config.with_random_state(seed);
        }
        config
    }

    /// Configured space, or the preset for this model and search mode
    pub fn search_space(&self) -> SearchSpace {
        self.space
            .clone()
            .unwrap_or_else(|| default_space(self.model, self.search))
    }

    /// `<model>_<gridsearch|randomsearch>`, shared by the run directory,
    /// the report file and the artifact names
    pub fn run_tag(&self) -> String {
        format!("{}_{}", self.model.short_name(), self.search.dir_name())
    }

    /// Output directory of one feature set
    pub fn feature_set_dir(&self, feature_set: &str) -> PathBuf {
        self.outdir.join(self.run_tag()).join(feature_set)
    }

    /// Text report file name
    pub fn report_file_name(&self) -> String {
        format!("{}.txt", self.run_tag())
    }

    /// Resolve the requested feature sets
    pub fn resolve_feature_sets(&self) -> Result<Vec<FeatureSet>> {
        self.feature_sets
            .iter()
            .map(|name| FeatureSet::builtin(name))
            .collect()
    }

    /// Check everything that can be checked before any data is read
    pub fn validate(&self) -> Result<()> {
        if self.feature_sets.is_empty() {
            return Err(MetrixError::ConfigError(
                "at least one feature set is required".to_string(),
            ));
        }
        self.resolve_feature_sets()?;
        self.tuner_config().validate()?;
        params::check_space(self.model, &self.search_space())?;
        if self.render_trees && self.dot_program.trim().is_empty() {
            return Err(MetrixError::ConfigError(
                "dot_program must not be empty when rendering trees".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ExperimentConfig::new();
        config.validate().unwrap();
        assert_eq!(config.run_tag(), "decisiontree_bag_gridsearch");
        assert_eq!(config.report_file_name(), "decisiontree_bag_gridsearch.txt");
        assert_eq!(
            config.feature_set_dir("prot_screen_trans"),
            PathBuf::from("./decisiontree_bag_gridsearch/prot_screen_trans")
        );
    }

    #[test]
    fn test_overrides_reach_tuner_config() {
        let config = ExperimentConfig::new()
            .with_model(EstimatorKind::BaggedTrees)
            .with_search(SearchMode::Random)
            .with_n_iter(12);
        let tuner = config.tuner_config();
        assert_eq!(tuner.n_iter, 12);
        // preset fold count for bagged random search survives
        assert_eq!(tuner.cv_folds, 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"model": "random-forest", "search": "random", "feature_sets": ["database", "man_add"]}"#,
        )
        .unwrap();

        let config = ExperimentConfig::from_json_file(&path).unwrap();
        assert_eq!(config.model, EstimatorKind::RandomForest);
        assert_eq!(config.search, SearchMode::Random);
        assert_eq!(config.feature_sets, vec!["database", "man_add"]);
        assert!(config.render_trees);
        assert_eq!(config.run_tag(), "randomforest_randomsearch");
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_unknown_feature_set_and_space() {
        let bad_set = ExperimentConfig::new().with_feature_sets(vec!["nope".to_string()]);
        assert!(bad_set.validate().is_err());

        let bad_space = ExperimentConfig::new()
            .with_model(EstimatorKind::DecisionTree)
            .with_space(SearchSpace::new().ints("n_estimators", &[10]));
        assert!(matches!(bad_space.validate(), Err(MetrixError::ConfigError(_))));
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            ExperimentConfig::from_json_file(&path),
            Err(MetrixError::ConfigError(_))
        ));
    }
}
