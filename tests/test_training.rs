//! Integration test: registry, grid search, tuning and comparison

mod common;

use std::sync::Arc;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use satisfaction_pipeline::error::{ErrorKind, Stage};
use satisfaction_pipeline::optimizer::{GridSearch, HyperparameterGrid, ModelTuner};
use satisfaction_pipeline::preprocessing::{Cleaner, FeatureBuilder, FeatureSelector};
use satisfaction_pipeline::tracking::{FileDashboard, MetricsDashboard};
use satisfaction_pipeline::training::{
    ClassifierRegistry, CrossValidator, HyperParams, ModelComparator, ParamValue,
};

/// Cleaned, encoded and selected survey table
fn engineered(rows: usize) -> DataFrame {
    let (cleaned, _) = Cleaner::default().clean(&common::survey(rows)).unwrap();
    let builder = FeatureBuilder::default();
    let (encoded, _) = builder.encode(&builder.build(&cleaned).unwrap()).unwrap();
    FeatureSelector::new(8).select(&encoded, "satisfaction").unwrap().0
}

fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
        0 => i as f64,
        1 => (2 * i + i % 3) as f64,
        _ => (i % 2) as f64,
    });
    let y = Array1::from_shape_fn(n, |i| if i >= n / 2 { 1.0 } else { 0.0 });
    (x, y)
}

#[test]
fn test_registry_order_and_lookup() {
    let registry = ClassifierRegistry::with_defaults(42);
    assert_eq!(registry.names(), ClassifierRegistry::DEFAULT_ORDER.to_vec());

    let err = registry.get("catboost").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_every_family_learns_a_separable_problem() {
    let (x, y) = separable(80);
    let registry = ClassifierRegistry::with_defaults(42);
    for name in ClassifierRegistry::DEFAULT_ORDER {
        let model = registry.get(name).unwrap().fit(&x, &y, &HyperParams::new()).unwrap();
        assert_eq!(model.family(), name);
        let pred = model.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / 80.0 >= 0.8, "{} scored {}/80", name, correct);
    }
}

#[test]
fn test_grid_search_scores_every_combination() {
    let (x, y) = separable(60);
    let grid = HyperparameterGrid::from_json(r#"{"n_estimators": [10, 20]}"#).unwrap();
    let trainer = ClassifierRegistry::with_defaults(42).get("gradient_boosting").unwrap();

    let study = GridSearch::new(trainer, CrossValidator::stratified(3)).run(&x, &y, &grid).unwrap();
    assert_eq!(study.trials.len(), 2);
    for trial in &study.trials {
        assert_eq!(trial.cv.scores.len(), 3);
    }
    let best = study.best_params().unwrap();
    assert!(grid.contains(best));
    assert!(study.trials.iter().all(|t| t.value() <= study.best_value().unwrap()));
}

#[test]
fn test_tuned_params_come_from_the_grid() {
    let df = engineered(240);
    let grid = HyperparameterGrid::from_json(r#"{"n_estimators": [10, 20]}"#).unwrap();
    let tuner = ModelTuner::new(ClassifierRegistry::with_defaults(42).get("gradient_boosting").unwrap());

    let model = tuner.tune(&df, "satisfaction", &grid, 3).unwrap();
    assert!(grid.contains(&model.best_params));
    assert_eq!(model.classifier, "gradient_boosting");
    assert_eq!(model.feature_names.len(), 8);
    assert!((0.0..=1.0).contains(&model.metrics.accuracy));
    assert!((0.0..=1.0).contains(&model.cv_score));
}

#[test]
fn test_seeded_tuning_is_reproducible() {
    let df = engineered(200);
    let grid = HyperparameterGrid::new()
        .with_values("n_estimators", vec![ParamValue::Int(5), ParamValue::Int(15)])
        .with_values("max_depth", vec![ParamValue::Int(3), ParamValue::Null]);
    let tuner = || ModelTuner::new(ClassifierRegistry::with_defaults(7).get("random_forest").unwrap()).with_random_state(7);

    let a = tuner().tune(&df, "satisfaction", &grid, 3).unwrap();
    let b = tuner().tune(&df, "satisfaction", &grid, 3).unwrap();
    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.cv_score, b.cv_score);
    assert_eq!(a.metrics, b.metrics);
}

#[test]
fn test_unknown_grid_parameter_is_rejected() {
    let df = engineered(120);
    let grid = HyperparameterGrid::from_json(r#"{"n_neighbours": [3]}"#).unwrap();
    let err = ModelTuner::new(ClassifierRegistry::with_defaults(42).get("k_nearest_neighbors").unwrap())
        .tune(&df, "satisfaction", &grid, 3)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(err.stage(), Some(Stage::ModelTuner));
}

#[test]
fn test_comparison_uses_one_split_for_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let dashboard = Arc::new(FileDashboard::new(dir.path()));
    let df = engineered(300);

    let comparator = ModelComparator::new(ClassifierRegistry::with_defaults(42))
        .with_dashboard(dashboard.clone() as Arc<dyn MetricsDashboard>);
    let results = comparator
        .compare(&df, "satisfaction", &["naive_bayes", "decision_tree", "logistic_regression"])
        .unwrap();

    assert_eq!(results.len(), 3);
    let support: Vec<usize> = results.values().map(|m| m.n_samples).collect();
    assert!(support.iter().all(|&n| n == 60));

    let scalars = std::fs::read_to_string(dashboard.scalars_path()).unwrap();
    assert_eq!(scalars.lines().count(), 12);
    assert!(scalars.contains("F1_Score/naive_bayes"));
    assert!(dashboard.matrix_path("decision_tree").is_file());
}

#[test]
fn test_comparison_sample_fraction() {
    let df = engineered(300);
    let results = ModelComparator::new(ClassifierRegistry::with_defaults(42))
        .with_sample_fraction(Some(0.5))
        .compare(&df, "satisfaction", &["naive_bayes"])
        .unwrap();
    assert_eq!(results["naive_bayes"].n_samples, 30);
}

#[test]
fn test_comparison_unknown_model_fails_before_fitting() {
    let df = engineered(100);
    let err = ModelComparator::new(ClassifierRegistry::with_defaults(42))
        .compare(&df, "satisfaction", &["naive_bayes", "xgboost"])
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::ModelComparator));
    assert_eq!(err.operation(), Some("resolve"));
}
