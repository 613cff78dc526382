//! Tuner configuration

use crate::error::{MetrixError, Result};
use crate::training::DEFAULT_N_ESTIMATORS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How candidates are enumerated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Exhaustive cartesian product
    #[default]
    Grid,
    /// Seeded sample of `n_iter` points
    Random,
}

impl SearchMode {
    /// Directory and report suffix
    pub fn dir_name(&self) -> &'static str {
        match self {
            SearchMode::Grid => "gridsearch",
            SearchMode::Random => "randomsearch",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Grid => f.write_str("grid"),
            SearchMode::Random => f.write_str("random"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = MetrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grid" => Ok(SearchMode::Grid),
            "random" => Ok(SearchMode::Random),
            other => Err(MetrixError::ConfigError(format!(
                "unknown search mode '{}', expected grid or random",
                other
            ))),
        }
    }
}

/// Configuration for hyperparameter search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Search mode
    pub mode: SearchMode,

    /// Points drawn in random mode
    pub n_iter: usize,

    /// Stratified cross-validation folds
    pub cv_folds: usize,

    /// Seed of the random-search sampler
    pub random_state: u64,

    /// Ensemble size when the space does not tune `n_estimators`
    pub default_n_estimators: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Grid,
            n_iter: 288,
            cv_folds: 10,
            random_state: 5,
            default_n_estimators: DEFAULT_N_ESTIMATORS,
        }
    }
}

impl TunerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_default_n_estimators(mut self, n: usize) -> Self {
        self.default_n_estimators = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(MetrixError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.mode == SearchMode::Random && self.n_iter == 0 {
            return Err(MetrixError::ConfigError(
                "n_iter must be at least 1 for random search".to_string(),
            ));
        }
        if self.default_n_estimators == 0 {
            return Err(MetrixError::ConfigError(
                "default_n_estimators must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
