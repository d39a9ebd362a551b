//! End-to-end pipeline execution
//!
//! [`PipelineRunner`] wires the stages together from one [`PipelineConfig`]:
//!
//! ```text
//! raw ─▶ ingest ─▶ train.csv ─▶ Cleaner ─▶ FeatureBuilder ─▶ FeatureSelector ─▶ ModelTuner ─▶ artifact
//!               └▶ test.csv ──────────────────────────────────────────────────▶ evaluate_holdout
//! ```
//!
//! Every failure leaves here as a stage-tagged [`PipelineError`]; only the
//! binary decides whether to abort.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use polars::prelude::*;
use tracing::{info, warn};

use super::ingestion::{DataIngestion, IngestionSummary};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage, StageContext};
use crate::export::TrainedModel;
use crate::optimizer::{HyperparameterGrid, ModelTuner, TuningOutcome};
use crate::preprocessing::{
    Cleaner, ColumnStats, FeatureBuilder, FeatureRanking, FeatureSelector, LabelEncoder, LabelMapping,
};
use crate::tracking::{ExperimentTracker, FileDashboard, LocalTracker, MetricsDashboard, NullDashboard, NullTracker};
use crate::training::{ClassificationMetrics, ModelComparator};
use crate::utils::{column_names, column_to_array1, DataLoader, DataSaver, Timer};

/// Training table after cleaning, feature building, encoding and selection
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Selected features plus the target, all numeric
    pub table: DataFrame,
    pub stats: ColumnStats,
    pub mappings: BTreeMap<String, LabelMapping>,
    pub ranking: FeatureRanking,
}

/// Results of [`PipelineRunner::run_all`]
#[derive(Debug)]
pub struct PipelineReport {
    pub ingestion: IngestionSummary,
    pub training: TuningOutcome,
    pub holdout: ClassificationMetrics,
}

pub struct PipelineRunner {
    config: PipelineConfig,
    tracker: Arc<dyn ExperimentTracker>,
    dashboard: Arc<dyn MetricsDashboard>,
}

impl PipelineRunner {
    /// Runner with file-backed collaborators, or null ones when tracking is off.
    pub fn new(config: PipelineConfig) -> Self {
        let (tracker, dashboard): (Arc<dyn ExperimentTracker>, Arc<dyn MetricsDashboard>) = if config.tracking.enabled {
            (
                Arc::new(LocalTracker::new(&config.paths.tracking_dir)),
                Arc::new(FileDashboard::new(&config.paths.dashboard_dir)),
            )
        } else {
            (Arc::new(NullTracker), Arc::new(NullDashboard))
        };
        Self {
            config,
            tracker,
            dashboard,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn ExperimentTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_dashboard(mut self, dashboard: Arc<dyn MetricsDashboard>) -> Self {
        self.dashboard = dashboard;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split the raw file into the train and test files.
    pub fn run_ingestion(&self) -> Result<IngestionSummary> {
        DataIngestion::from_config(&self.config)
            .run()
            .in_stage(Stage::Ingestion, "split")
    }

    /// Clean, build, encode and select on the training file, writing both
    /// intermediate tables.
    pub fn prepare_training_data(&self) -> Result<PreparedData> {
        let paths = &self.config.paths;
        let raw = DataLoader::new()
            .load_csv(&paths.train_data)
            .in_stage(Stage::Persistence, "read_train")?;
        info!(rows = raw.height(), columns = raw.width(), "training data loaded");

        let (mut cleaned, stats) = Cleaner::from_config(&self.config.cleaning)
            .clean(&raw)
            .in_stage(Stage::Cleaner, "clean")?;
        DataSaver::save_csv(&mut cleaned, &paths.processed_data).in_stage(Stage::Persistence, "write_processed")?;

        let builder = FeatureBuilder::new(self.config.features.clone());
        let built = builder.build(&cleaned).in_stage(Stage::FeatureBuilder, "build")?;
        let (encoded, mappings) = builder.encode(&built).in_stage(Stage::FeatureBuilder, "encode")?;

        let (mut table, ranking) = FeatureSelector::new(self.config.selection.k)
            .with_test_size(self.config.selection.test_size)
            .with_random_state(self.config.random_state)
            .select(&encoded, &self.config.target_column)
            .in_stage(Stage::FeatureSelector, "select")?;
        DataSaver::save_csv(&mut table, &paths.engineered_data).in_stage(Stage::Persistence, "write_engineered")?;

        Ok(PreparedData {
            table,
            stats,
            mappings,
            ranking,
        })
    }

    /// Prepare the training file, grid-search the configured classifier and
    /// persist the winner.
    pub fn run_training(&self) -> Result<TuningOutcome> {
        let timer = Timer::start();
        let prepared = self.prepare_training_data()?;
        let grid = HyperparameterGrid::from_file(&self.config.paths.params).in_stage(Stage::ModelTuner, "read_grid")?;

        let tuner = ModelTuner::from_config(&self.config)
            .in_stage(Stage::ModelTuner, "resolve")?
            .with_tracker(Arc::clone(&self.tracker))
            .with_preprocessing(prepared.mappings, Some(prepared.stats));
        let outcome = tuner.tune_with_report(
            &prepared.table,
            &self.config.target_column,
            &grid,
            self.config.tuning.cv_folds,
        )?;

        info!(
            classifier = %outcome.model.classifier,
            accuracy = outcome.model.metrics.accuracy,
            elapsed_ms = timer.elapsed_ms(),
            "training complete"
        );
        Ok(outcome)
    }

    /// Score the persisted artifact on the held-out test file, processed with
    /// the statistics and mappings stored in the artifact.
    pub fn evaluate_holdout(&self) -> Result<ClassificationMetrics> {
        let model = TrainedModel::load(&self.config.paths.model).in_stage(Stage::Persistence, "read_model")?;
        let raw = DataLoader::new()
            .load_csv(&self.config.paths.test_data)
            .in_stage(Stage::Persistence, "read_test")?;

        let table = self.transform_rows(&model, &raw, false)?;
        let y_true = column_to_array1(&table, &model.target_column).in_stage(Stage::ModelTuner, "evaluate")?;
        let metrics = model
            .predict_frame(&table)
            .and_then(|y_pred| ClassificationMetrics::compute(&y_true, &y_pred))
            .in_stage(Stage::ModelTuner, "evaluate")?;

        info!(
            rows = table.height(),
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            "holdout evaluation"
        );
        Ok(metrics)
    }

    /// Compare every configured classifier family on the engineered table.
    pub fn run_comparison(&self) -> Result<BTreeMap<String, ClassificationMetrics>> {
        let table = DataLoader::new()
            .load_csv(&self.config.paths.engineered_data)
            .in_stage(Stage::Persistence, "read_engineered")?;
        ModelComparator::from_config(&self.config)
            .with_dashboard(Arc::clone(&self.dashboard))
            .compare(&table, &self.config.target_column, &self.config.comparison.models)
    }

    /// Predict labels for the rows in `input` and return them as a new
    /// `prediction` column. Writes the table to `output` when given.
    pub fn predict_file(&self, input: impl AsRef<Path>, output: Option<&Path>) -> Result<DataFrame> {
        let model = TrainedModel::load(&self.config.paths.model).in_stage(Stage::Persistence, "read_model")?;
        let raw = DataLoader::new()
            .load_csv(input.as_ref())
            .in_stage(Stage::Persistence, "read_input")?;

        let table = self.transform_rows(&model, &raw, true)?;
        let codes = model.predict_frame(&table).in_stage(Stage::ModelTuner, "predict")?;
        let labels = codes
            .iter()
            .map(|code| model.decode_target(code.round() as i64).map(str::to_string))
            .collect::<Result<Vec<String>>>()
            .in_stage(Stage::ModelTuner, "predict")?;

        let mut out = raw.clone();
        out.with_column(Series::new("prediction".into(), labels))
            .map_err(PipelineError::from)
            .in_stage(Stage::ModelTuner, "predict")?;
        if let Some(path) = output {
            DataSaver::save_csv(&mut out, path).in_stage(Stage::Persistence, "write_predictions")?;
        }
        info!(rows = out.height(), "predictions written");
        Ok(out)
    }

    /// Ingest, train, then evaluate on the held-out split.
    pub fn run_all(&self) -> Result<PipelineReport> {
        let timer = Timer::start();
        let ingestion = self.run_ingestion()?;
        let training = self.run_training()?;
        let holdout = self.evaluate_holdout()?;
        info!(elapsed_ms = timer.elapsed_ms(), "pipeline complete");
        Ok(PipelineReport {
            ingestion,
            training,
            holdout,
        })
    }

    /// Replay the stored cleaning, feature building and encoding on new rows.
    /// Serving rows may omit the target and the dropped columns.
    fn transform_rows(&self, model: &TrainedModel, raw: &DataFrame, serving: bool) -> Result<DataFrame> {
        let mut stats = model.column_stats.clone().ok_or_else(|| {
            PipelineError::SerializationError("artifact carries no cleaning statistics".to_string())
        })?;
        let present = column_names(raw);
        if serving {
            stats.dropped_columns.retain(|c| present.contains(c));
        }
        let cleaned = Cleaner::apply(raw, &stats).in_stage(Stage::Cleaner, "apply")?;
        let built = FeatureBuilder::new(self.config.features.clone())
            .build(&cleaned)
            .in_stage(Stage::FeatureBuilder, "build")?;

        let mut mappings = model.label_mappings.clone();
        if serving && !present.contains(&model.target_column) {
            mappings.remove(&model.target_column);
        }
        if mappings.is_empty() {
            warn!("artifact carries no label mappings, categorical columns left as read");
        }
        LabelEncoder::apply(&built, &mappings).in_stage(Stage::FeatureBuilder, "encode")
    }
}
