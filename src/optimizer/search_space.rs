//! Hyperparameter search space definition

use crate::error::{MetrixError, Result};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    String(String),
    /// Explicit "unset" (unlimited depth, no class weighting, ...)
    None,
}

impl ParameterValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParameterValue::None)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "'{}'", v),
            ParameterValue::None => f.write_str("None"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

/// Domain of one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// Explicit candidate list
    Discrete { choices: Vec<ParameterValue> },
    /// Uniform integer in `[low, high)`
    RandInt { low: i64, high: i64 },
}

/// A named hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Discrete parameter over arbitrary values
    pub fn discrete(name: impl Into<String>, choices: Vec<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Discrete { choices },
        }
    }

    /// Discrete integer parameter
    pub fn ints(name: impl Into<String>, choices: &[i64]) -> Self {
        Self::discrete(name, choices.iter().map(|&v| ParameterValue::Int(v)).collect())
    }

    /// Discrete string parameter
    pub fn strings(name: impl Into<String>, choices: &[&str]) -> Self {
        Self::discrete(name, choices.iter().map(|&v| ParameterValue::from(v)).collect())
    }

    /// Uniform integer parameter over `[low, high)`
    pub fn randint(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::RandInt { low, high },
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self.param_type, ParameterType::Discrete { .. })
    }

    /// Draw one value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Discrete { choices } => choices[rng.gen_range(0..choices.len())].clone(),
            ParameterType::RandInt { low, high } => ParameterValue::Int(rng.gen_range(*low..*high)),
        }
    }
}

/// One point of a search space, in declared parameter order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamPoint {
    values: Vec<(String, ParameterValue)>,
}

impl ParamPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.values.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for ParamPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{}': {}", name, value)?;
        }
        f.write_str("}")
    }
}

/// Ordered collection of hyperparameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn ints(self, name: impl Into<String>, choices: &[i64]) -> Self {
        self.add(Parameter::ints(name, choices))
    }

    pub fn strings(self, name: impl Into<String>, choices: &[&str]) -> Self {
        self.add(Parameter::strings(name, choices))
    }

    pub fn randint(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::randint(name, low, high))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name)
    }

    /// Parameter names in declared order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// True when every parameter has an explicit candidate list
    pub fn is_discrete(&self) -> bool {
        self.parameters.iter().all(Parameter::is_discrete)
    }

    /// Names unique, candidate lists non-empty, integer ranges non-empty
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for p in &self.parameters {
            if !seen.insert(p.name.as_str()) {
                return Err(MetrixError::ConfigError(format!(
                    "parameter '{}' declared twice",
                    p.name
                )));
            }
            match &p.param_type {
                ParameterType::Discrete { choices } if choices.is_empty() => {
                    return Err(MetrixError::ConfigError(format!(
                        "parameter '{}' has no candidates",
                        p.name
                    )));
                }
                ParameterType::RandInt { low, high } if low >= high => {
                    return Err(MetrixError::ConfigError(format!(
                        "parameter '{}' has empty range [{}, {})",
                        p.name, low, high
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Number of grid points; `None` when a parameter is a distribution
    pub fn grid_size(&self) -> Option<usize> {
        self.parameters.iter().try_fold(1usize, |acc, p| match &p.param_type {
            ParameterType::Discrete { choices } => Some(acc.saturating_mul(choices.len())),
            ParameterType::RandInt { .. } => None,
        })
    }

    fn discrete_choices(&self) -> Result<Vec<&[ParameterValue]>> {
        self.parameters
            .iter()
            .map(|p| match &p.param_type {
                ParameterType::Discrete { choices } => Ok(choices.as_slice()),
                ParameterType::RandInt { .. } => Err(MetrixError::ConfigError(format!(
                    "grid search needs a candidate list for '{}'",
                    p.name
                ))),
            })
            .collect()
    }

    /// Grid point at a flat index; the last parameter varies fastest
    fn grid_point(&self, choices: &[&[ParameterValue]], mut flat: usize) -> ParamPoint {
        let mut picked = vec![0usize; choices.len()];
        for (slot, c) in picked.iter_mut().zip(choices).rev() {
            *slot = flat % c.len();
            flat /= c.len();
        }
        let values = self
            .parameters
            .iter()
            .zip(choices)
            .zip(picked)
            .map(|((p, c), i)| (p.name.clone(), c[i].clone()))
            .collect();
        ParamPoint { values }
    }

    /// Every grid point: cartesian product in declared order
    pub fn grid(&self) -> Result<Vec<ParamPoint>> {
        self.validate()?;
        let choices = self.discrete_choices()?;
        let size = self.grid_size().unwrap_or(0);
        Ok((0..size).map(|i| self.grid_point(&choices, i)).collect())
    }

    /// Random candidates.
    ///
    /// A fully discrete space is sampled without replacement and the draw is
    /// capped at its grid size; otherwise `n_iter` points are drawn
    /// independently, parameter by parameter in declared order.
    pub fn sample_points(&self, n_iter: usize, rng: &mut impl Rng) -> Result<Vec<ParamPoint>> {
        self.validate()?;
        if let Some(size) = self.grid_size() {
            let choices = self.discrete_choices()?;
            let n = n_iter.min(size);
            return Ok(index::sample(rng, size, n)
                .into_iter()
                .map(|flat| self.grid_point(&choices, flat))
                .collect());
        }
        Ok((0..n_iter)
            .map(|_| {
                let values = self
                    .parameters
                    .iter()
                    .map(|p| (p.name.clone(), p.sample(rng)))
                    .collect();
                ParamPoint { values }
            })
            .collect())
    }
}
