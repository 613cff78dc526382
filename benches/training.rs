use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use metrix_ml::optimizer::{SearchSpace, Tuner, TunerConfig};
use metrix_ml::training::{Classifier, EstimatorKind, ModelParams, TreeParams, ESTIMATOR_SEED};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    // label depends on the first two features plus noise
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let score = row[0] - row[1] + rng.gen::<f64>() * 2.0 - 1.0;
            if score > 0.0 { 1.0 } else { 0.0 }
        })
        .collect();
    (x, y)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let tree = TreeParams::default().with_max_depth(6);
    let kinds = [
        ("tree", ModelParams::DecisionTree { tree: tree.clone() }),
        (
            "bagged_20",
            ModelParams::BaggedTrees {
                base: tree.clone(),
                n_estimators: 20,
            },
        ),
        (
            "forest_20",
            ModelParams::RandomForest {
                tree: tree.with_max_features(4),
                n_estimators: 20,
            },
        ),
    ];

    for n_rows in [500, 2000].iter() {
        let data = create_classification_data(*n_rows, 16);
        for (name, params) in &kinds {
            group.bench_with_input(BenchmarkId::new(*name, n_rows), &data, |b, (x, y)| {
                b.iter(|| {
                    let mut model = params.build(ESTIMATOR_SEED).unwrap();
                    model.fit(black_box(x), black_box(y)).unwrap();
                    model
                })
            });
        }
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("tuning");
    group.sample_size(10);

    let (x, y) = create_classification_data(500, 16);
    let space = SearchSpace::new()
        .strings("criterion", &["gini", "entropy"])
        .ints("max_depth", &[3, 5, 8]);
    let tuner = Tuner::new(
        EstimatorKind::DecisionTree,
        space,
        TunerConfig::new().with_cv_folds(5),
    );

    group.bench_function("grid_tree_6x5", |b| {
        b.iter(|| tuner.tune(black_box(&x), black_box(&y)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_training, bench_grid_search);
criterion_main!(benches);
