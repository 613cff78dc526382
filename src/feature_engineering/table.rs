//! Feature table: ordered named columns over a dense row-major matrix

use crate::error::{MetrixError, Result};
use ndarray::{Array2, ArrayView1, Axis};

/// Derived feature table for one feature set
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    feature_set: String,
    names: Vec<String>,
    data: Array2<f64>,
}

impl FeatureTable {
    /// Build a table; the column count must match the names
    pub fn new(feature_set: impl Into<String>, names: Vec<String>, data: Array2<f64>) -> Result<Self> {
        if names.len() != data.ncols() {
            return Err(MetrixError::ShapeError {
                expected: format!("{} columns", names.len()),
                actual: format!("{} columns", data.ncols()),
            });
        }
        Ok(Self {
            feature_set: feature_set.into(),
            names,
            data,
        })
    }

    /// Name of the feature set this table was derived for
    pub fn feature_set(&self) -> &str {
        &self.feature_set
    }

    /// Column names in declared order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Row-major feature matrix
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// View of a named column
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.data.column(idx))
    }

    /// New table holding the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> FeatureTable {
        FeatureTable {
            feature_set: self.feature_set.clone(),
            names: self.names.clone(),
            data: self.data.select(Axis(0), rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_shape_checked() {
        let err = FeatureTable::new("x", vec!["a".into()], array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, MetrixError::ShapeError { .. }));
    }

    #[test]
    fn test_select_rows_and_column() {
        let table = FeatureTable::new(
            "x",
            vec!["a".into(), "b".into()],
            array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]],
        )
        .unwrap();

        let sub = table.select_rows(&[2, 0]);
        assert_eq!(sub.n_rows(), 2);
        assert_eq!(sub.names(), table.names());
        assert_eq!(sub.column("b").unwrap().to_vec(), vec![30.0, 10.0]);
        assert!(sub.column("c").is_none());
    }
}
