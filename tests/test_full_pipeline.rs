//! Integration test: full pipeline (ingest → clean → engineer → select → tune → persist → evaluate)

mod common;

use std::sync::Arc;

use satisfaction_pipeline::error::{ErrorKind, Stage};
use satisfaction_pipeline::export::TrainedModel;
use satisfaction_pipeline::pipeline::PipelineRunner;
use satisfaction_pipeline::tracking::{LocalTracker, RunStatus};
use satisfaction_pipeline::utils::{column_names, columns_to_array2, DataLoader};

const GRID: &str = r#"{"n_estimators": [10, 20], "max_depth": [2, 3]}"#;

#[test]
fn test_full_pipeline_produces_consistent_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::workspace(dir.path(), 250, GRID);
    let runner = PipelineRunner::new(config.clone());

    let report = runner.run_all().unwrap();
    assert_eq!(report.ingestion.train_rows + report.ingestion.test_rows, 250);
    assert_eq!(report.training.study.trials.len(), 4);
    assert_eq!(report.holdout.n_samples, report.ingestion.test_rows);

    let model = TrainedModel::load(&config.paths.model).unwrap();
    assert_eq!(model.classifier, "gradient_boosting");
    assert_eq!(model.target_column, "satisfaction");
    assert_eq!(model.feature_names.len(), 8);
    assert!(model.label_mappings.contains_key("satisfaction"));
    assert!(model.column_stats.is_some());

    // The engineered table holds exactly the artifact's features plus the target
    let engineered = DataLoader::new().load_csv(&config.paths.engineered_data).unwrap();
    let mut expected = model.feature_names.clone();
    expected.push("satisfaction".to_string());
    assert_eq!(column_names(&engineered), expected);

    // Cleaned intermediate keeps every row and drops the id columns
    let processed = DataLoader::new().load_csv(&config.paths.processed_data).unwrap();
    assert_eq!(processed.height(), report.ingestion.train_rows);
    assert!(processed.column("id").is_err());
}

#[test]
fn test_reloaded_artifact_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::workspace(dir.path(), 200, GRID);
    let runner = PipelineRunner::new(config.clone());
    runner.run_ingestion().unwrap();
    let outcome = runner.run_training().unwrap();

    let engineered = DataLoader::new().load_csv(&config.paths.engineered_data).unwrap();
    let x = columns_to_array2(&engineered, &outcome.model.feature_names).unwrap();
    let reloaded = TrainedModel::load(&config.paths.model).unwrap();

    assert_eq!(outcome.model.predict(&x).unwrap(), reloaded.predict(&x).unwrap());
    for row in x.rows().into_iter().take(10) {
        let code = reloaded.predict_vector(row.as_slice().unwrap()).unwrap();
        assert!(reloaded.decode_target(code).is_ok());
    }
    assert_eq!(
        reloaded.predict_vector(&[1.0, 2.0]).unwrap_err().kind(),
        ErrorKind::Schema
    );
}

#[test]
fn test_rerun_is_deterministic_and_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::workspace(dir.path(), 200, GRID);

    let first = PipelineRunner::new(config.clone()).run_all().unwrap();
    let second = PipelineRunner::new(config.clone()).run_all().unwrap();

    assert_eq!(first.training.model.best_params, second.training.model.best_params);
    assert_eq!(first.training.model.feature_names, second.training.model.feature_names);
    assert_eq!(first.holdout, second.holdout);
    assert!(!config.paths.model.with_extension("json.tmp").exists());
}

#[test]
fn test_tracked_run_records_grid_and_best_params() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::workspace(dir.path(), 200, GRID).with_tracking(true);
    let tracker = Arc::new(LocalTracker::new(&config.paths.tracking_dir));
    let runner = PipelineRunner::new(config.clone()).with_tracker(tracker.clone());

    runner.run_ingestion().unwrap();
    let outcome = runner.run_training().unwrap();
    assert!(outcome.tracking_error.is_none());

    let runs = tracker.load_runs(&config.tuning.experiment_name).unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.params["grid_n_estimators"], "[10, 20]");
    assert!(run.params.contains_key("best_max_depth"));
    assert_eq!(run.metrics["accuracy"], outcome.model.metrics.accuracy);
    assert!(run.model_blob.is_some());
}

#[test]
fn test_missing_raw_file_aborts_at_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::workspace(dir.path(), 50, GRID);
    std::fs::remove_file(&config.paths.raw_data).unwrap();

    let err = PipelineRunner::new(config).run_all().unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Ingestion));
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.kind().is_fatal());
}

#[test]
fn test_schema_error_names_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::workspace(dir.path(), 100, GRID);
    config.cleaning.outlier_columns.push("Seat comfort".to_string());
    let runner = PipelineRunner::new(config);
    runner.run_ingestion().unwrap();

    let err = runner.run_training().unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Cleaner));
    assert_eq!(err.kind(), ErrorKind::Schema);
}
