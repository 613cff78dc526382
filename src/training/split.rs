//! Train/test partitioning

use crate::error::{MetrixError, Result};
use crate::feature_engineering::FeatureTable;
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Fraction of rows held out for testing
pub const TEST_FRACTION: f64 = 0.2;

/// Seed of the partition shuffle
pub const SPLIT_SEED: u64 = 42;

/// How rows are assigned to the held-out partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Seeded permutation of all rows
    #[default]
    Plain,
    /// Class proportions preserved in both partitions
    Stratified,
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMode::Plain => f.write_str("plain"),
            SplitMode::Stratified => f.write_str("stratified"),
        }
    }
}

impl FromStr for SplitMode {
    type Err = MetrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(SplitMode::Plain),
            "stratified" => Ok(SplitMode::Stratified),
            other => Err(MetrixError::ConfigError(format!(
                "unknown split mode '{}', expected plain or stratified",
                other
            ))),
        }
    }
}

/// Immutable train/test partition of one feature table
#[derive(Debug, Clone)]
pub struct Split {
    train_rows: Vec<usize>,
    test_rows: Vec<usize>,
    x_train: FeatureTable,
    x_test: FeatureTable,
    y_train: Array1<f64>,
    y_test: Array1<f64>,
}

impl Split {
    /// Row indices (into the input table) of the training partition
    pub fn train_rows(&self) -> &[usize] {
        &self.train_rows
    }

    pub fn test_rows(&self) -> &[usize] {
        &self.test_rows
    }

    pub fn x_train(&self) -> &FeatureTable {
        &self.x_train
    }

    pub fn x_test(&self) -> &FeatureTable {
        &self.x_test
    }

    pub fn y_train(&self) -> &Array1<f64> {
        &self.y_train
    }

    pub fn y_test(&self) -> &Array1<f64> {
        &self.y_test
    }
}

/// Splitter with a fixed test fraction and seed
#[derive(Debug, Clone)]
pub struct Splitter {
    mode: SplitMode,
    test_fraction: f64,
    seed: u64,
}

impl Splitter {
    pub fn new(mode: SplitMode) -> Self {
        Self {
            mode,
            test_fraction: TEST_FRACTION,
            seed: SPLIT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of held-out rows for `n` samples
    pub fn n_test(&self, n: usize) -> usize {
        (self.test_fraction * n as f64).ceil() as usize
    }

    /// Partition a feature table and its labels
    pub fn split(&self, x: &FeatureTable, y: &Array1<f64>) -> Result<Split> {
        let n = x.n_rows();
        if n != y.len() {
            return Err(MetrixError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", y.len()),
            });
        }
        let n_test = self.n_test(n);
        if n_test == 0 || n_test >= n {
            return Err(MetrixError::ValidationError(format!(
                "cannot hold out {} of {} rows",
                n_test, n
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let (train_rows, test_rows) = match self.mode {
            SplitMode::Plain => {
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(&mut rng);
                let train = order.split_off(n_test);
                (train, order)
            }
            SplitMode::Stratified => stratified_rows(y, n_test, &mut rng)?,
        };

        let split = Split {
            x_train: x.select_rows(&train_rows),
            x_test: x.select_rows(&test_rows),
            y_train: train_rows.iter().map(|&r| y[r]).collect(),
            y_test: test_rows.iter().map(|&r| y[r]).collect(),
            train_rows,
            test_rows,
        };

        if split.x_train.names() != x.names() {
            return Err(MetrixError::SchemaDrift {
                feature_set: x.feature_set().to_string(),
                detail: "training partition columns differ from the input".to_string(),
            });
        }

        info!(
            feature_set = %x.feature_set(),
            mode = %self.mode,
            train = split.train_rows.len(),
            test = split.test_rows.len(),
            "Split samples"
        );
        Ok(split)
    }
}

/// Per-class shuffle, then largest-remainder allocation of the test quota
fn stratified_rows(
    y: &Array1<f64>,
    n_test: usize,
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = y.len();
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &v) in y.iter().enumerate() {
        by_class.entry(v.round() as i64).or_default().push(i);
    }
    if let Some((class, rows)) = by_class.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(MetrixError::ValidationError(format!(
            "class {} has {} member(s), stratified split needs at least 2",
            class,
            rows.len()
        )));
    }

    for rows in by_class.values_mut() {
        rows.shuffle(rng);
    }

    let exact: Vec<f64> = by_class
        .values()
        .map(|rows| n_test as f64 * rows.len() as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|q| q.floor() as usize).collect();
    let mut remaining = n_test - alloc.iter().sum::<usize>();

    let mut by_remainder: Vec<usize> = (0..exact.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    let sizes: Vec<usize> = by_class.values().map(|rows| rows.len()).collect();
    while remaining > 0 {
        let before = remaining;
        for &c in &by_remainder {
            if remaining > 0 && alloc[c] + 1 < sizes[c] {
                alloc[c] += 1;
                remaining -= 1;
            }
        }
        if remaining == before {
            return Err(MetrixError::ValidationError(format!(
                "cannot place {} test rows while keeping every class in training",
                n_test
            )));
        }
    }

    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (rows, &k) in by_class.values().zip(&alloc) {
        test.extend_from_slice(&rows[..k]);
        train.extend_from_slice(&rows[k..]);
    }
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::collections::BTreeSet;

    fn table(n: usize) -> (FeatureTable, Array1<f64>) {
        let data = Array2::from_shape_fn((n, 2), |(i, j)| (i * 10 + j) as f64);
        let x = FeatureTable::new("t", vec!["a".into(), "b".into()], data).unwrap();
        let y = (0..n).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    fn assert_partition(split: &Split, n: usize) {
        let train: BTreeSet<usize> = split.train_rows().iter().copied().collect();
        let test: BTreeSet<usize> = split.test_rows().iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), n);
        assert_eq!(train.union(&test).count(), n);
    }

    #[test]
    fn test_plain_split_sizes() {
        let (x, y) = table(101);
        let split = Splitter::new(SplitMode::Plain).split(&x, &y).unwrap();
        assert_eq!(split.test_rows().len(), 21);
        assert_eq!(split.train_rows().len(), 80);
        assert_eq!(split.x_train().names(), x.names());
        assert_partition(&split, 101);
    }

    #[test]
    fn test_rows_follow_indices() {
        let (x, y) = table(20);
        let split = Splitter::new(SplitMode::Plain).split(&x, &y).unwrap();
        for (i, &row) in split.test_rows().iter().enumerate() {
            assert_eq!(split.x_test().data()[[i, 0]], (row * 10) as f64);
            assert_eq!(split.y_test()[i], y[row]);
        }
    }

    #[test]
    fn test_deterministic() {
        let (x, y) = table(50);
        let a = Splitter::new(SplitMode::Stratified).split(&x, &y).unwrap();
        let b = Splitter::new(SplitMode::Stratified).split(&x, &y).unwrap();
        assert_eq!(a.train_rows(), b.train_rows());
        assert_eq!(a.test_rows(), b.test_rows());

        let c = Splitter::new(SplitMode::Stratified).with_seed(7).split(&x, &y).unwrap();
        assert_partition(&c, 50);
    }

    #[test]
    fn test_stratified_keeps_proportions() {
        // 25 positives, 75 negatives
        let (x, y) = table(100);
        let split = Splitter::new(SplitMode::Stratified).split(&x, &y).unwrap();
        assert_eq!(split.test_rows().len(), 20);
        assert_eq!(split.y_test().sum(), 5.0);
        assert_eq!(split.y_train().sum(), 20.0);
        assert_partition(&split, 100);
    }

    #[test]
    fn test_stratified_needs_two_per_class() {
        let (x, mut y) = table(10);
        y.fill(0.0);
        y[3] = 1.0;
        assert!(Splitter::new(SplitMode::Stratified).split(&x, &y).is_err());
    }

    #[test]
    fn test_too_few_rows() {
        let (x, y) = table(1);
        assert!(Splitter::new(SplitMode::Plain).split(&x, &y).is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("stratified".parse::<SplitMode>().unwrap(), SplitMode::Stratified);
        assert!("random".parse::<SplitMode>().is_err());
    }
}
