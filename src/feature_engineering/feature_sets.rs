//! Named feature-set definitions
//!
//! A feature set declares which raw columns it reads, which derived columns it
//! computes (in dependency order) and the final ordered column list.

use super::derivation::{self, Derivation};
use crate::error::{MetrixError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Names of the built-in feature sets, in reporting order
pub const BUILTIN_FEATURE_SETS: [&str; 5] = [
    "database",
    "man_add",
    "transform",
    "prot_screen_trans",
    "newdata_transform",
];

const DATABASE_COLUMNS: [&str; 21] = [
    "IoverSigma",
    "anomalousslope",
    "anomalousCC",
    "anomalousmulti",
    "multiplicity",
    "diffI",
    "cchalf",
    "totalobservations",
    "wilsonbfactor",
    "lowreslimit",
    "anomalouscompl",
    "highreslimit",
    "completeness",
    "totalunique",
    "RmergediffI",
    "RmergeI",
    "RmeasI",
    "RmeasdiffI",
    "RpimdiffI",
    "RpimI",
    "diffF",
];

const MANUAL_COLUMNS: [&str; 8] = [
    "wavelength",
    "Vcell",
    "Matth_coeff",
    "No_atom_chain",
    "solvent_content",
    "No_mol_ASU",
    "MW_chain",
    "sites_ASU",
];

const TRANSFORM_COLUMNS: [&str; 39] = [
    "IoverSigma",
    "cchalf",
    "RmergediffI",
    "RmergeI",
    "RmeasI",
    "RmeasdiffI",
    "RpimdiffI",
    "RpimI",
    "totalobservations",
    "totalunique",
    "multiplicity",
    "completeness",
    "lowreslimit",
    "highreslimit",
    "wilsonbfactor",
    "anomalousslope",
    "anomalousCC",
    "anomalousmulti",
    "anomalouscompl",
    "diffI",
    "diffF",
    "wavelength",
    "wavelength**3",
    "wavelength**3/Vcell",
    "Vcell",
    "solvent_content",
    "Vcell/Vm<Ma>",
    "Matth_coeff",
    "MW_ASU/sites_ASU/solvent_content",
    "MW_chain",
    "No_atom_chain",
    "No_mol_ASU",
    "MW_ASU",
    "sites_ASU",
    "MW_ASU/sites_ASU",
    "MW_chain/No_atom_chain",
    "wilson",
    "bragg",
    "volume_wilsonB_highres",
];

const PROT_SCREEN_RAW: [&str; 9] = [
    "highreslimit",
    "wavelength",
    "Vcell",
    "Matth_coeff",
    "No_atom_chain",
    "solvent_content",
    "No_mol_ASU",
    "MW_chain",
    "sites_ASU",
];

const PROT_SCREEN_COLUMNS: [&str; 16] = [
    "highreslimit",
    "wavelength",
    "Vcell",
    "wavelength**3",
    "wavelength**3/Vcell",
    "solvent_content",
    "Vcell/Vm<Ma>",
    "Matth_coeff",
    "MW_ASU/sites_ASU/solvent_content",
    "MW_chain",
    "No_atom_chain",
    "No_mol_ASU",
    "MW_ASU",
    "sites_ASU",
    "MW_ASU/sites_ASU",
    "MW_chain/No_atom_chain",
];

const NEWDATA_RAW: [&str; 37] = [
    "IoverSigma",
    "cchalf",
    "RmergediffI",
    "RmergeI",
    "RmeasI",
    "RmeasdiffI",
    "RpimdiffI",
    "RpimI",
    "totalobservations",
    "totalunique",
    "multiplicity",
    "completeness",
    "lowreslimit",
    "highreslimit",
    "wilsonbfactor",
    "anomalousslope",
    "anomalousCC",
    "anomalousmulti",
    "anomalouscompl",
    "diffI",
    "diffF",
    "f",
    "wavelength",
    "sg_number",
    "cell_a",
    "cell_b",
    "cell_c",
    "cell_alpha",
    "cell_beta",
    "cell_gamma",
    "Vcell",
    "solvent_content",
    "Matth_coeff",
    "No_atom_chain",
    "No_mol_ASU",
    "MW_chain",
    "sites_ASU",
];

const NEWDATA_COLUMNS: [&str; 48] = [
    "IoverSigma",
    "cchalf",
    "RmergediffI",
    "RmergeI",
    "RmeasI",
    "RmeasdiffI",
    "RpimdiffI",
    "RpimI",
    "totalobservations",
    "totalunique",
    "multiplicity",
    "completeness",
    "lowreslimit",
    "highreslimit",
    "wilsonbfactor",
    "anomalousslope",
    "anomalousCC",
    "anomalousmulti",
    "anomalouscompl",
    "diffI",
    "diffF",
    "f",
    "wavelength",
    "wavelength**3",
    "wavelength**3/Vcell",
    "sg_number",
    "cell_a",
    "cell_b",
    "cell_c",
    "cell_alpha",
    "cell_beta",
    "cell_gamma",
    "Vcell",
    "solvent_content",
    "Vcell/Vm<Ma>",
    "Matth_coeff",
    "MW_ASU/sites_ASU/solvent_content",
    "MW_chain",
    "No_atom_chain",
    "No_mol_ASU",
    "MW_ASU",
    "sites_ASU",
    "MW_ASU/sites_ASU",
    "MW_chain/No_atom_chain",
    "wilson",
    "bragg",
    "volume_wilsonB_highres",
    "IoverSigma/MW_ASU",
];

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Protein and screen derivations shared by every transformed set
fn protein_derivations() -> Vec<Derivation> {
    vec![
        derivation::mw_asu(),
        derivation::mw_asu_per_site(),
        derivation::mw_per_atom(),
        derivation::mw_per_site_per_solvent(),
        derivation::wavelength_cubed(),
        derivation::wavelength_cubed_per_volume(),
        derivation::volume_per_matthews_mass(),
    ]
}

fn diffraction_derivations() -> Vec<Derivation> {
    vec![
        derivation::wilson(),
        derivation::bragg(),
        derivation::volume_wilson_b_highres(),
    ]
}

/// Definition of one feature-set variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Variant name, also used as output directory name
    pub name: String,
    /// Raw columns read from the sample table
    pub raw_inputs: Vec<String>,
    /// Derived columns, in dependency order
    pub derivations: Vec<Derivation>,
    /// Final ordered column list
    pub columns: Vec<String>,
}

impl FeatureSet {
    /// Create an empty definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_inputs: Vec::new(),
            derivations: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Set the raw input columns
    pub fn with_raw_inputs(mut self, raw: Vec<String>) -> Self {
        self.raw_inputs = raw;
        self
    }

    /// Set the derivations
    pub fn with_derivations(mut self, derivations: Vec<Derivation>) -> Self {
        self.derivations = derivations;
        self
    }

    /// Set the declared output columns
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Look up a built-in feature set by name
    pub fn builtin(name: &str) -> Result<Self> {
        let set = match name {
            "database" => FeatureSet::new(name)
                .with_raw_inputs(owned(&DATABASE_COLUMNS))
                .with_columns(owned(&DATABASE_COLUMNS)),
            "man_add" => {
                let mut columns = owned(&DATABASE_COLUMNS);
                columns.extend(owned(&MANUAL_COLUMNS));
                FeatureSet::new(name)
                    .with_raw_inputs(columns.clone())
                    .with_columns(columns)
            }
            "transform" => {
                let mut raw = owned(&DATABASE_COLUMNS);
                raw.extend(owned(&MANUAL_COLUMNS));
                let mut derivations = protein_derivations();
                derivations.extend(diffraction_derivations());
                FeatureSet::new(name)
                    .with_raw_inputs(raw)
                    .with_derivations(derivations)
                    .with_columns(owned(&TRANSFORM_COLUMNS))
            }
            "prot_screen_trans" => FeatureSet::new(name)
                .with_raw_inputs(owned(&PROT_SCREEN_RAW))
                .with_derivations(protein_derivations())
                .with_columns(owned(&PROT_SCREEN_COLUMNS)),
            "newdata_transform" => {
                let mut derivations = protein_derivations();
                derivations.insert(2, derivation::i_over_sigma_per_mw_asu());
                derivations.extend(diffraction_derivations());
                FeatureSet::new(name)
                    .with_raw_inputs(owned(&NEWDATA_RAW))
                    .with_derivations(derivations)
                    .with_columns(owned(&NEWDATA_COLUMNS))
            }
            other => {
                return Err(MetrixError::ConfigError(format!(
                    "unknown feature set '{}', expected one of {:?}",
                    other, BUILTIN_FEATURE_SETS
                )))
            }
        };
        Ok(set)
    }

    /// Check the definition is internally consistent.
    ///
    /// Every derivation may only read raw inputs or earlier derivations, and
    /// every declared column must be a raw input or a derivation output.
    pub fn validate(&self) -> Result<()> {
        let mut available: BTreeSet<&str> = BTreeSet::new();
        for raw in &self.raw_inputs {
            if !available.insert(raw.as_str()) {
                return Err(MetrixError::ConfigError(format!(
                    "feature set '{}': raw column '{}' listed twice",
                    self.name, raw
                )));
            }
        }

        for d in &self.derivations {
            if let Some(missing) = d.formula.inputs().into_iter().find(|c| !available.contains(c)) {
                return Err(MetrixError::ConfigError(format!(
                    "feature set '{}': derivation '{}' reads '{}' before it is available",
                    self.name, d.name, missing
                )));
            }
            if !available.insert(d.name.as_str()) {
                return Err(MetrixError::ConfigError(format!(
                    "feature set '{}': column '{}' produced twice",
                    self.name, d.name
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for col in &self.columns {
            if !available.contains(col.as_str()) {
                return Err(MetrixError::ConfigError(format!(
                    "feature set '{}': declared column '{}' is neither raw nor derived",
                    self.name, col
                )));
            }
            if !seen.insert(col.as_str()) {
                return Err(MetrixError::ConfigError(format!(
                    "feature set '{}': declared column '{}' listed twice",
                    self.name, col
                )));
            }
        }

        if self.columns.is_empty() {
            return Err(MetrixError::ConfigError(format!(
                "feature set '{}' declares no columns",
                self.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sizes() {
        let expected = [
            ("database", 21),
            ("man_add", 29),
            ("transform", 39),
            ("prot_screen_trans", 16),
            ("newdata_transform", 48),
        ];
        for (name, n) in expected {
            let set = FeatureSet::builtin(name).unwrap();
            assert_eq!(set.columns.len(), n, "{}", name);
            set.validate().unwrap();
        }
    }

    #[test]
    fn test_prot_screen_trans_derivations() {
        let set = FeatureSet::builtin("prot_screen_trans").unwrap();
        assert_eq!(set.raw_inputs.len(), 9);
        assert_eq!(set.derivations.len(), 7);
        assert!(!set.columns.iter().any(|c| c == "wilson"));
    }

    #[test]
    fn test_unknown_feature_set() {
        let err = FeatureSet::builtin("everything").unwrap_err();
        assert!(matches!(err, MetrixError::ConfigError(_)));
    }

    #[test]
    fn test_validate_rejects_undeclared_source() {
        let set = FeatureSet::new("broken")
            .with_raw_inputs(vec!["a".into()])
            .with_columns(vec!["a".into(), "b".into()]);
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_order_derivation() {
        let set = FeatureSet::new("broken")
            .with_raw_inputs(owned(&PROT_SCREEN_RAW))
            .with_derivations(vec![derivation::mw_asu_per_site(), derivation::mw_asu()])
            .with_columns(vec!["MW_ASU/sites_ASU".into()]);
        assert!(set.validate().is_err());
    }
}
