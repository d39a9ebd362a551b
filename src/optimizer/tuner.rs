//! Grid-search tuning, held-out evaluation and artifact persistence
//!
//! A tuning run moves through `Loaded → Split → Searched → Evaluated →
//! Persisted`. A failure stops the run at the stage it was trying to reach and
//! is reported as a `ModelTuner` stage error naming that step.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use tracing::{debug, info, warn};

use super::grid::HyperparameterGrid;
use super::search::{GridSearch, Study};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage, StageContext};
use crate::export::TrainedModel;
use crate::preprocessing::{ColumnStats, LabelMapping};
use crate::tracking::{ExperimentTracker, NullTracker, RunRecord};
use crate::training::{
    train_test_split, ClassificationMetrics, ClassifierRegistry, CrossValidator, FittedModel, TrainableClassifier,
};
use crate::utils::{column_names, column_to_array1, columns_to_array2, select_rows, Timer};

/// Progress of a tuning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TunerStage {
    Loaded,
    Split,
    Searched,
    Evaluated,
    Persisted,
}

impl TunerStage {
    /// Operation name used when entering this stage fails.
    pub fn operation(&self) -> &'static str {
        match self {
            TunerStage::Loaded => "load",
            TunerStage::Split => "split",
            TunerStage::Searched => "search",
            TunerStage::Evaluated => "evaluate",
            TunerStage::Persisted => "persist",
        }
    }
}

impl fmt::Display for TunerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TunerStage::Loaded => "LOADED",
            TunerStage::Split => "SPLIT",
            TunerStage::Searched => "SEARCHED",
            TunerStage::Evaluated => "EVALUATED",
            TunerStage::Persisted => "PERSISTED",
        };
        f.write_str(name)
    }
}

/// Everything a tuning run produced
#[derive(Debug)]
pub struct TuningOutcome {
    pub model: TrainedModel,
    pub study: Study,
    /// Last stage reached
    pub stage: TunerStage,
    /// Set when the experiment tracker could not be reached
    pub tracking_error: Option<PipelineError>,
}

/// Selects hyperparameters for one classifier family
pub struct ModelTuner {
    trainer: Arc<dyn TrainableClassifier>,
    test_size: f64,
    random_state: u64,
    artifact_path: Option<PathBuf>,
    tracker: Arc<dyn ExperimentTracker>,
    experiment_name: String,
    label_mappings: BTreeMap<String, LabelMapping>,
    column_stats: Option<ColumnStats>,
}

impl ModelTuner {
    pub fn new(trainer: Arc<dyn TrainableClassifier>) -> Self {
        Self {
            trainer,
            test_size: 0.2,
            random_state: 42,
            artifact_path: None,
            tracker: Arc::new(NullTracker),
            experiment_name: "Model_Training_Experiment".to_string(),
            label_mappings: BTreeMap::new(),
            column_stats: None,
        }
    }

    /// Tuner for the configured classifier, persisting to the configured model path.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let registry = ClassifierRegistry::with_defaults(config.random_state);
        Ok(Self::new(registry.get(&config.tuning.classifier)?)
            .with_test_size(config.tuning.test_size)
            .with_random_state(config.random_state)
            .with_artifact_path(config.paths.model.clone())
            .with_experiment_name(config.tuning.experiment_name.clone()))
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn ExperimentTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Mappings and cleaning statistics stored in the artifact
    pub fn with_preprocessing(mut self, mappings: BTreeMap<String, LabelMapping>, stats: Option<ColumnStats>) -> Self {
        self.label_mappings = mappings;
        self.column_stats = stats;
        self
    }

    pub fn tune(&self, df: &DataFrame, target: &str, grid: &HyperparameterGrid, cv_folds: usize) -> Result<TrainedModel> {
        Ok(self.tune_with_report(df, target, grid, cv_folds)?.model)
    }

    /// Run every stage and report the search details alongside the model.
    pub fn tune_with_report(
        &self,
        df: &DataFrame,
        target: &str,
        grid: &HyperparameterGrid,
        cv_folds: usize,
    ) -> Result<TuningOutcome> {
        // The run starts as the tuner enters LOADED
        let run = RunRecord::new(&self.experiment_name).with_params(grid.to_prefixed_strings("grid_"));
        let result = self.run_stages(df, target, grid, cv_folds, run.clone());
        if let Err(e) = &result {
            let run = run.fail(e);
            if let Err(track_err) = self.tracker.log_run(&run) {
                warn!(error = %track_err, "could not record failed run");
            }
        }
        result
    }

    fn run_stages(
        &self,
        df: &DataFrame,
        target: &str,
        grid: &HyperparameterGrid,
        cv_folds: usize,
        run: RunRecord,
    ) -> Result<TuningOutcome> {
        let timer = Timer::start();
        let classifier = self.trainer.name();

        // LOADED
        let (x, y, feature_names) = Self::load(df, target).in_stage(Stage::ModelTuner, TunerStage::Loaded.operation())?;
        self.advance(TunerStage::Loaded);

        // SPLIT
        let (train_idx, test_idx) = train_test_split(x.nrows(), self.test_size, self.random_state)
            .in_stage(Stage::ModelTuner, TunerStage::Split.operation())?;
        let (x_train, y_train) = select_rows(&x, &y, &train_idx);
        let (x_test, y_test) = select_rows(&x, &y, &test_idx);
        self.advance(TunerStage::Split);

        // SEARCHED
        let cv = CrossValidator::stratified(cv_folds).with_random_state(self.random_state);
        let (study, final_model) = self
            .search(&x_train, &y_train, grid, cv)
            .in_stage(Stage::ModelTuner, TunerStage::Searched.operation())?;
        let best_params = study.best_params().cloned().unwrap_or_default();
        let cv_score = study.best_value().unwrap_or(0.0);
        info!(
            classifier,
            combinations = study.trials.len(),
            best_params = %best_params,
            cv_accuracy = cv_score,
            "grid search finished"
        );
        self.advance(TunerStage::Searched);

        // EVALUATED
        let metrics = final_model
            .predict(&x_test)
            .and_then(|pred| ClassificationMetrics::compute(&y_test, &pred))
            .in_stage(Stage::ModelTuner, TunerStage::Evaluated.operation())?;
        info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            "held-out evaluation"
        );
        self.advance(TunerStage::Evaluated);

        let mut model = TrainedModel::new(
            classifier,
            final_model,
            feature_names,
            target,
            best_params,
            cv_score,
            metrics,
        )
        .with_label_mappings(self.label_mappings.clone());
        if let Some(stats) = &self.column_stats {
            model = model.with_column_stats(stats.clone());
        }

        // PERSISTED
        let mut stage = TunerStage::Evaluated;
        if let Some(path) = &self.artifact_path {
            model
                .save(path)
                .in_stage(Stage::ModelTuner, TunerStage::Persisted.operation())?;
            stage = TunerStage::Persisted;
            self.advance(stage);
        }

        let tracking_error = self.track(run, &model).err();
        if let Some(e) = &tracking_error {
            warn!(error = %e, "experiment tracking failed; continuing");
        }

        info!(elapsed_ms = timer.elapsed_ms(), stage = %stage, "tuning finished");
        Ok(TuningOutcome {
            model,
            study,
            stage,
            tracking_error,
        })
    }

    fn load(df: &DataFrame, target: &str) -> Result<(Array2<f64>, Array1<f64>, Vec<String>)> {
        let features: Vec<String> = column_names(df).into_iter().filter(|c| c != target).collect();
        let y = column_to_array1(df, target)?;
        if features.is_empty() {
            return Err(PipelineError::InsufficientFeatures {
                requested: 1,
                available: 0,
            });
        }
        Ok((columns_to_array2(df, &features)?, y, features))
    }

    /// Score the grid, then refit the winner on the whole training split.
    fn search(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        grid: &HyperparameterGrid,
        cv: CrossValidator,
    ) -> Result<(Study, FittedModel)> {
        let study = GridSearch::new(Arc::clone(&self.trainer), cv).run(x_train, y_train, grid)?;
        let best = study
            .best_params()
            .ok_or_else(|| PipelineError::TrainingError("grid search produced no trials".to_string()))?;
        let model = self.trainer.fit(x_train, y_train, best)?;
        Ok((study, model))
    }

    fn advance(&self, stage: TunerStage) {
        debug!(classifier = self.trainer.name(), stage = %stage, "tuner stage reached");
    }

    fn track(&self, run: RunRecord, model: &TrainedModel) -> Result<()> {
        let mut run = run.with_params(model.best_params.to_prefixed_strings("best_"));
        run.log_param("classifier", &model.classifier);
        run.log_metric("accuracy", model.metrics.accuracy);
        run.log_metric("precision", model.metrics.precision);
        run.log_metric("recall", model.metrics.recall);
        run.log_metric("f1", model.metrics.f1);
        run.log_metric("cv_accuracy", model.cv_score);
        let run = run.with_model_blob(model.to_json()?).finish();
        self.tracker.log_run(&run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tracking::{LocalTracker, RunStatus};
    use polars::prelude::*;

    fn frame() -> DataFrame {
        let n = 60;
        let a: Vec<f64> = (0..n).map(|i| (i % 30) as f64 + if i % 3 == 0 { 25.0 } else { 0.0 }).collect();
        let b: Vec<i64> = (0..n).map(|i| (i % 7) as i64).collect();
        let y: Vec<i64> = (0..n).map(|i| (i % 3 == 0) as i64).collect();
        df!("a" => a, "b" => b, "satisfaction" => y).unwrap()
    }

    fn tuner(name: &str) -> ModelTuner {
        ModelTuner::new(ClassifierRegistry::with_defaults(42).get(name).unwrap())
    }

    #[test]
    fn test_best_params_come_from_grid() {
        let grid = HyperparameterGrid::from_json(r#"{"n_estimators": [10, 20]}"#).unwrap();
        let model = tuner("gradient_boosting").tune(&frame(), "satisfaction", &grid, 3).unwrap();
        assert!(grid.contains(&model.best_params));
        assert_eq!(model.feature_names, vec!["a", "b"]);
        assert_eq!(model.metrics.n_samples, 12);
    }

    #[test]
    fn test_persists_and_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let tracker = Arc::new(LocalTracker::new(dir.path().join("runs")));
        let grid = HyperparameterGrid::from_json(r#"{"max_depth": [2, 4]}"#).unwrap();

        let outcome = tuner("decision_tree")
            .with_artifact_path(&path)
            .with_tracker(tracker.clone())
            .with_experiment_name("exp")
            .tune_with_report(&frame(), "satisfaction", &grid, 3)
            .unwrap();

        assert_eq!(outcome.stage, TunerStage::Persisted);
        assert!(outcome.tracking_error.is_none());
        assert!(path.is_file());

        let runs = tracker.load_runs("exp").unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].params.contains_key("grid_max_depth"));
        assert!(runs[0].params.contains_key("best_max_depth"));
        assert!(runs[0].metrics.contains_key("cv_accuracy"));

        // Run timestamps bracket the artifact timestamp
        let model = TrainedModel::load(&path).unwrap();
        assert!(runs[0].started_at <= model.trained_at);
        assert!(model.trained_at <= runs[0].finished_at);
    }

    #[test]
    fn test_tracker_failure_is_not_fatal() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let outcome = tuner("naive_bayes")
            .with_tracker(Arc::new(LocalTracker::new(file.path())))
            .tune_with_report(&frame(), "satisfaction", &HyperparameterGrid::new(), 3)
            .unwrap();
        assert_eq!(outcome.stage, TunerStage::Evaluated);
        assert_eq!(outcome.tracking_error.unwrap().kind(), ErrorKind::ExternalCollaborator);
    }

    #[test]
    fn test_failure_reports_stage_and_records_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(LocalTracker::new(dir.path()));
        let grid = HyperparameterGrid::from_json(r#"{"gamma": [1]}"#).unwrap();
        let err = tuner("naive_bayes")
            .with_tracker(tracker.clone())
            .with_experiment_name("bad")
            .tune(&frame(), "satisfaction", &grid, 3)
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::ModelTuner));
        assert_eq!(err.operation(), Some("search"));
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(tracker.load_runs("bad").unwrap()[0].status, RunStatus::Failed);
    }

    #[test]
    fn test_missing_target_fails_at_load() {
        let err = tuner("naive_bayes")
            .tune(&frame(), "label", &HyperparameterGrid::new(), 3)
            .unwrap_err();
        assert_eq!(err.operation(), Some("load"));
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let grid = HyperparameterGrid::from_json(r#"{"n_estimators": [5, 10], "max_depth": [2, 3]}"#).unwrap();
        let a = tuner("random_forest").tune(&frame(), "satisfaction", &grid, 3).unwrap();
        let b = tuner("random_forest").tune(&frame(), "satisfaction", &grid, 3).unwrap();
        assert_eq!(a.best_params, b.best_params);
        assert_eq!(a.metrics, b.metrics);
    }
}
