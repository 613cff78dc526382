//! Hyperparameter search module
//!
//! Provides grid and random search over tree hyperparameters, scored with
//! stratified k-fold accuracy:
//! - Search spaces of discrete candidate lists and integer ranges
//! - Parameter routing for single trees and ensembles
//! - Built-in spaces per estimator kind and search mode

mod config;
pub mod params;
pub mod presets;
mod search_space;
mod tuner;

pub use config::{SearchMode, TunerConfig};
pub use params::{model_params_from_point, scoring_params, BASE_PREFIX};
pub use presets::{default_space, default_tuner_config};
pub use search_space::{ParamPoint, Parameter, ParameterType, ParameterValue, SearchSpace};
pub use tuner::{BestParams, Study, TrialResult, Tuner};
