//! Data loading utilities

use crate::error::{MetrixError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Name of the binary outcome column
pub const LABEL_COLUMN: &str = "EP_success";

/// Data loader for delimited tabular files
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Load a delimited file with a header row
    pub fn load_csv_with_separator(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            MetrixError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let parse_opts = CsvParseOptions::default().with_separator(separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| MetrixError::DataError(e.to_string()))
    }

    /// Detect the separator from the extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let separator = if ext == "tsv" { b'\t' } else { b',' };
        self.load_csv_with_separator(path, separator)
    }

    /// Load a sample table with the default label column
    pub fn load_samples(&self, path: &Path) -> Result<SampleTable> {
        let start = Instant::now();
        let df = self.load_auto(path)?;
        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded sample table"
        );
        SampleTable::new(df, LABEL_COLUMN)
    }
}

/// Raw crystallographic samples: named numeric columns plus the binary label
#[derive(Debug, Clone)]
pub struct SampleTable {
    df: DataFrame,
    label_column: String,
}

impl SampleTable {
    /// Wrap a frame; the label column must exist
    pub fn new(df: DataFrame, label_column: &str) -> Result<Self> {
        if df.column(label_column).is_err() {
            return Err(MetrixError::ColumnNotFound(label_column.to_string()));
        }
        Ok(Self {
            df,
            label_column: label_column.to_string(),
        })
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.df.height()
    }

    /// Column names in file order
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Check whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    /// Name of the label column
    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Underlying frame
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Read a column as f64; nulls and unparseable cells become NaN
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .df
            .column(name)
            .map_err(|_| MetrixError::ColumnNotFound(name.to_string()))?;
        let series = column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| MetrixError::DataError(format!("column '{}': {}", name, e)))?;
        let values = series
            .f64()
            .map_err(|e| MetrixError::DataError(e.to_string()))?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        Ok(values)
    }

    /// Read the label column; every value must be 0 or 1
    pub fn labels(&self) -> Result<Array1<f64>> {
        let values = self.column_f64(&self.label_column)?;
        if let Some((row, bad)) = values
            .iter()
            .enumerate()
            .find(|(_, &v)| v != 0.0 && v != 1.0)
        {
            return Err(MetrixError::DataError(format!(
                "label '{}' must be 0 or 1, found {} at row {}",
                self.label_column, bad, row
            )));
        }
        Ok(Array1::from_vec(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "Vcell,wavelength,EP_success").unwrap();
        writeln!(file, "1000.5,0.98,1").unwrap();
        writeln!(file, "2000.0,,0").unwrap();
        writeln!(file, "1500.25,1.2,1").unwrap();
        file
    }

    #[test]
    fn test_load_samples() {
        let file = create_test_csv();
        let table = DataLoader::new().load_samples(file.path()).unwrap();

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column_names(), vec!["Vcell", "wavelength", "EP_success"]);
        assert!(table.has_column("Vcell"));
        assert!(!table.has_column("sites_ASU"));
    }

    #[test]
    fn test_nulls_become_nan() {
        let file = create_test_csv();
        let table = DataLoader::new().load_samples(file.path()).unwrap();

        let wavelength = table.column_f64("wavelength").unwrap();
        assert_eq!(wavelength[0], 0.98);
        assert!(wavelength[1].is_nan());
    }

    #[test]
    fn test_labels() {
        let file = create_test_csv();
        let table = DataLoader::new().load_samples(file.path()).unwrap();
        let y = table.labels().unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_label_column() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let err = SampleTable::new(df, LABEL_COLUMN).unwrap_err();
        assert!(matches!(err, MetrixError::ColumnNotFound(_)));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let df = df!("a" => &[1.0, 2.0], "EP_success" => &[0.0, 2.0]).unwrap();
        let table = SampleTable::new(df, LABEL_COLUMN).unwrap();
        assert!(table.labels().is_err());
    }
}
