//! Feature derivation
//!
//! Turns a raw [`SampleTable`] into the [`FeatureTable`] of one feature set:
//! raw columns are read, derived columns computed in dependency order, and the
//! declared column list assembled. Non-finite values never escape: they are
//! replaced with 0 as soon as they are produced.

pub mod derivation;
pub mod feature_sets;
pub mod table;

pub use derivation::{Derivation, Formula};
pub use feature_sets::{FeatureSet, BUILTIN_FEATURE_SETS};
pub use table::FeatureTable;

use crate::error::{MetrixError, Result};
use crate::utils::{finite_or_zero, SampleTable};
use ndarray::Array2;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Derive the feature table of `set` from the raw samples
pub fn derive_features(samples: &SampleTable, set: &FeatureSet) -> Result<FeatureTable> {
    set.validate()?;

    let missing: Vec<&str> = set
        .raw_inputs
        .iter()
        .filter(|c| !samples.has_column(c))
        .map(|c| c.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(MetrixError::ColumnNotFound(format!(
            "feature set '{}' needs {}",
            set.name,
            missing.join(", ")
        )));
    }

    let n = samples.n_rows();
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for raw in &set.raw_inputs {
        let values = samples
            .column_f64(raw)?
            .into_iter()
            .map(finite_or_zero)
            .collect();
        columns.insert(raw.clone(), values);
    }

    for d in &set.derivations {
        let inputs: Vec<&Vec<f64>> = d
            .formula
            .inputs()
            .into_iter()
            .map(|name| {
                columns
                    .get(name)
                    .ok_or_else(|| MetrixError::ColumnNotFound(name.to_string()))
            })
            .collect::<Result<_>>()?;

        let mut args = vec![0.0; inputs.len()];
        let mut replaced = 0usize;
        let values: Vec<f64> = (0..n)
            .map(|row| {
                for (slot, col) in args.iter_mut().zip(&inputs) {
                    *slot = col[row];
                }
                let v = d.formula.eval(&args);
                if !v.is_finite() {
                    replaced += 1;
                }
                finite_or_zero(v)
            })
            .collect();

        if replaced > 0 {
            debug!(column = %d.name, replaced, "Replaced non-finite derived values with 0");
        }
        columns.insert(d.name.clone(), values);
    }

    let mut data = Array2::<f64>::zeros((n, set.columns.len()));
    for (j, name) in set.columns.iter().enumerate() {
        let values = columns
            .get(name)
            .ok_or_else(|| MetrixError::SchemaDrift {
                feature_set: set.name.clone(),
                detail: format!("column '{}' was not produced", name),
            })?;
        for (i, v) in values.iter().enumerate() {
            data[[i, j]] = *v;
        }
    }

    let table = FeatureTable::new(set.name.clone(), set.columns.clone(), data)?;
    check_schema(&table, set)?;

    info!(
        feature_set = %set.name,
        rows = table.n_rows(),
        features = table.n_features(),
        "Derived feature table"
    );
    Ok(table)
}

/// The table's column set must equal the declared list exactly
fn check_schema(table: &FeatureTable, set: &FeatureSet) -> Result<()> {
    let produced: BTreeSet<&str> = table.names().iter().map(|s| s.as_str()).collect();
    let declared: BTreeSet<&str> = set.columns.iter().map(|s| s.as_str()).collect();

    if produced != declared || table.names().len() != set.columns.len() {
        let extra: Vec<&str> = produced.difference(&declared).copied().collect();
        let absent: Vec<&str> = declared.difference(&produced).copied().collect();
        return Err(MetrixError::SchemaDrift {
            feature_set: set.name.clone(),
            detail: format!("unexpected {:?}, missing {:?}", extra, absent),
        });
    }
    if table.data().iter().any(|v| !v.is_finite()) {
        return Err(MetrixError::SchemaDrift {
            feature_set: set.name.clone(),
            detail: "non-finite value in derived table".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::LABEL_COLUMN;
    use polars::prelude::*;

    fn prot_screen_samples() -> SampleTable {
        let df = df!(
            "highreslimit" => &[2.0, 0.0, 1.5],
            "wavelength" => &[1.0, 2.0, 0.9],
            "Vcell" => &[1000.0, 0.0, 500.0],
            "Matth_coeff" => &[2.5, 2.0, 0.0],
            "No_atom_chain" => &[100.0, 0.0, 50.0],
            "solvent_content" => &[50.0, 40.0, 45.0],
            "No_mol_ASU" => &[2.0, 1.0, 1.0],
            "MW_chain" => &[1100.0, 800.0, 600.0],
            "sites_ASU" => &[4.0, 0.0, 2.0],
            "EP_success" => &[1.0, 0.0, 1.0]
        )
        .unwrap();
        SampleTable::new(df, LABEL_COLUMN).unwrap()
    }

    #[test]
    fn test_derived_table_is_complete_and_finite() {
        let samples = prot_screen_samples();
        let set = FeatureSet::builtin("prot_screen_trans").unwrap();
        let table = derive_features(&samples, &set).unwrap();

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.names(), set.columns.as_slice());
        assert!(table.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_derived_values() {
        let samples = prot_screen_samples();
        let set = FeatureSet::builtin("prot_screen_trans").unwrap();
        let table = derive_features(&samples, &set).unwrap();

        let mw_asu = table.column("MW_ASU").unwrap();
        assert_eq!(mw_asu[0], 2200.0);
        let per_site = table.column("MW_ASU/sites_ASU").unwrap();
        assert_eq!(per_site[0], 550.0);
        // division by zero sites becomes 0, and so does everything built on it
        assert_eq!(per_site[1], 0.0);
        let per_solvent = table.column("MW_ASU/sites_ASU/solvent_content").unwrap();
        assert_eq!(per_solvent[1], 0.0);
        let cubed = table.column("wavelength**3").unwrap();
        assert_eq!(cubed[1], 8.0);
        let per_volume = table.column("wavelength**3/Vcell").unwrap();
        assert_eq!(per_volume[1], 0.0);
    }

    #[test]
    fn test_matthews_volume_uses_sanitized_input() {
        let samples = prot_screen_samples();
        let set = FeatureSet::builtin("prot_screen_trans").unwrap();
        let table = derive_features(&samples, &set).unwrap();

        // row 0: 1000 / (2.5 * 11)
        let v = table.column("Vcell/Vm<Ma>").unwrap();
        assert!((v[0] - 1000.0 / 27.5).abs() < 1e-12);
        // row 1: MW_chain/No_atom_chain is 0 after sanitizing, so the quotient is 0
        assert_eq!(v[1], 0.0);
    }

    #[test]
    fn test_missing_raw_column() {
        let df = df!("Vcell" => &[1.0], "EP_success" => &[1.0]).unwrap();
        let samples = SampleTable::new(df, LABEL_COLUMN).unwrap();
        let set = FeatureSet::builtin("prot_screen_trans").unwrap();
        let err = derive_features(&samples, &set).unwrap_err();
        assert!(matches!(err, MetrixError::ColumnNotFound(_)));
    }

    #[test]
    fn test_null_cells_become_zero() {
        let df = df!(
            "a" => &[Some(1.0), None],
            "EP_success" => &[1.0, 0.0]
        )
        .unwrap();
        let samples = SampleTable::new(df, LABEL_COLUMN).unwrap();
        let set = FeatureSet::new("just_a")
            .with_raw_inputs(vec!["a".into()])
            .with_columns(vec!["a".into()]);
        let table = derive_features(&samples, &set).unwrap();
        assert_eq!(table.column("a").unwrap().to_vec(), vec![1.0, 0.0]);
    }
}
