use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use satisfaction_pipeline::optimizer::{GridSearch, HyperparameterGrid};
use satisfaction_pipeline::preprocessing::FeatureSelector;
use satisfaction_pipeline::training::{ClassifierRegistry, CrossValidator};

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen_range(0..6) as f64);
    let y = Array1::from_shape_fn(n_rows, |i| if x[[i, 0]] + x[[i, 1]] > 5.0 { 1.0 } else { 0.0 });
    (x, y)
}

fn to_frame(x: &Array2<f64>, y: &Array1<f64>) -> DataFrame {
    let mut columns: Vec<Column> = (0..x.ncols())
        .map(|j| Column::new(format!("feature_{}", j).into(), x.column(j).to_vec()))
        .collect();
    columns.push(Column::new("satisfaction".into(), y.to_vec()));
    DataFrame::new(columns).unwrap()
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let grid = HyperparameterGrid::from_json(r#"{"n_estimators": [10, 20], "max_depth": [2, 3]}"#).unwrap();
    let trainer = ClassifierRegistry::with_defaults(42).get("gradient_boosting").unwrap();

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_classification_data(*n_rows, 12);
        let search = GridSearch::new(trainer.clone(), CrossValidator::stratified(3));
        group.bench_with_input(BenchmarkId::new("gradient_boosting", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| search.run(black_box(x), black_box(y), &grid).unwrap())
        });
    }

    group.finish();
}

fn bench_feature_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_selection");

    for n_rows in [1000, 10000].iter() {
        let (x, y) = create_classification_data(*n_rows, 20);
        let df = to_frame(&x, &y);
        group.bench_with_input(BenchmarkId::new("mutual_info", n_rows), &df, |b, df| {
            b.iter(|| FeatureSelector::new(12).select(black_box(df), "satisfaction").unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grid_search, bench_feature_selection);
criterion_main!(benches);
