//! Side-by-side evaluation of classifier families under one split

use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{info, warn};

use super::cross_validation::{sample_indices, train_test_split};
use super::metrics::ClassificationMetrics;
use super::models::HyperParams;
use super::registry::ClassifierRegistry;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage, StageContext};
use crate::tracking::{MetricsDashboard, NullDashboard};
use crate::utils::{column_names, columns_to_array2, column_to_array1, select_rows, take_rows, Timer};

/// Fits each requested family on an identical train split and scores it on
/// an identical test split. Results are advisory.
pub struct ModelComparator {
    registry: ClassifierRegistry,
    params: BTreeMap<String, HyperParams>,
    sample_fraction: Option<f64>,
    test_size: f64,
    random_state: u64,
    dashboard: Arc<dyn MetricsDashboard>,
}

impl ModelComparator {
    pub fn new(registry: ClassifierRegistry) -> Self {
        Self {
            registry,
            params: BTreeMap::new(),
            sample_fraction: None,
            test_size: 0.2,
            random_state: 42,
            dashboard: Arc::new(NullDashboard),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(ClassifierRegistry::with_defaults(config.random_state))
            .with_params(config.comparison.params.clone())
            .with_sample_fraction(config.comparison.sample_fraction)
            .with_test_size(config.comparison.test_size)
            .with_random_state(config.random_state)
    }

    pub fn with_params(mut self, params: BTreeMap<String, HyperParams>) -> Self {
        self.params = params;
        self
    }

    pub fn with_sample_fraction(mut self, fraction: Option<f64>) -> Self {
        self.sample_fraction = fraction;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_dashboard(mut self, dashboard: Arc<dyn MetricsDashboard>) -> Self {
        self.dashboard = dashboard;
        self
    }

    /// Metrics per model name. Every non-target column is a feature.
    pub fn compare<S: AsRef<str>>(
        &self,
        df: &DataFrame,
        target: &str,
        models: &[S],
    ) -> Result<BTreeMap<String, ClassificationMetrics>> {
        let timer = Timer::start();
        let (x, y) = self.prepare(df, target).in_stage(Stage::ModelComparator, "prepare")?;

        // Resolve every name before fitting anything
        let trainers = models
            .iter()
            .map(|m| self.registry.get(m.as_ref()))
            .collect::<Result<Vec<_>>>()
            .in_stage(Stage::ModelComparator, "resolve")?;

        let (train_idx, test_idx) =
            train_test_split(x.nrows(), self.test_size, self.random_state).in_stage(Stage::ModelComparator, "split")?;
        let (x_train, y_train) = select_rows(&x, &y, &train_idx);
        let (x_test, y_test) = select_rows(&x, &y, &test_idx);
        info!(
            models = trainers.len(),
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            "comparing classifiers"
        );

        let default_params = HyperParams::new();
        let results: Vec<(String, ClassificationMetrics)> = trainers
            .par_iter()
            .map(|trainer| {
                let params = self.params.get(trainer.name()).unwrap_or(&default_params);
                let model = trainer.fit(&x_train, &y_train, params)?;
                let metrics = ClassificationMetrics::compute(&y_test, &model.predict(&x_test)?)?;
                Ok((trainer.name().to_string(), metrics))
            })
            .collect::<Result<_>>()
            .in_stage(Stage::ModelComparator, "fit")?;

        for (step, (name, metrics)) in results.iter().enumerate() {
            info!(
                model = %name,
                accuracy = metrics.accuracy,
                precision = metrics.precision,
                recall = metrics.recall,
                f1 = metrics.f1,
                "model evaluated"
            );
            if let Err(e) = self.publish(step, name, metrics) {
                warn!(model = %name, error = %e, "dashboard update failed");
            }
        }

        info!(elapsed_ms = timer.elapsed_ms(), "comparison finished");
        Ok(results.into_iter().collect())
    }

    fn prepare(&self, df: &DataFrame, target: &str) -> Result<(Array2<f64>, Array1<f64>)> {
        if df.column(target).is_err() {
            return Err(PipelineError::missing_column(target));
        }
        let df = match self.sample_fraction {
            Some(fraction) => {
                let idx = sample_indices(df.height(), fraction, self.random_state)?;
                take_rows(df, &idx)?
            }
            None => df.clone(),
        };
        let features: Vec<String> = column_names(&df).into_iter().filter(|c| c != target).collect();
        if features.is_empty() {
            return Err(PipelineError::InsufficientFeatures {
                requested: 1,
                available: 0,
            });
        }
        Ok((columns_to_array2(&df, &features)?, column_to_array1(&df, target)?))
    }

    fn publish(&self, step: usize, name: &str, metrics: &ClassificationMetrics) -> Result<()> {
        for (tag, value) in [
            ("Accuracy", metrics.accuracy),
            ("Precision", metrics.precision),
            ("Recall", metrics.recall),
            ("F1_Score", metrics.f1),
        ] {
            self.dashboard.log_scalar(&format!("{}/{}", tag, name), value, step)?;
        }
        self.dashboard.log_confusion_matrix(name, &metrics.confusion_matrix, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tracking::FileDashboard;

    fn frame() -> DataFrame {
        let n = 80;
        // Disjoint per class: 0..40 for the negatives, 60..100 for the positives
        let a: Vec<f64> = (0..n).map(|i| (i % 40) as f64 + if i % 2 == 0 { 60.0 } else { 0.0 }).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 7) % 13) as f64).collect();
        let y: Vec<i64> = (0..n).map(|i| (i % 2 == 0) as i64).collect();
        df!("a" => a, "b" => b, "satisfaction" => y).unwrap()
    }

    #[test]
    fn test_compare_scores_requested_models() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = Arc::new(FileDashboard::new(dir.path()));
        let comparator = ModelComparator::new(ClassifierRegistry::with_defaults(42)).with_dashboard(dashboard.clone());

        let results = comparator
            .compare(&frame(), "satisfaction", &["naive_bayes", "decision_tree"])
            .unwrap();
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["decision_tree", "naive_bayes"]);
        for m in results.values() {
            assert_eq!(m.n_samples, 16);
            assert!(m.accuracy > 0.9);
        }

        let scalars = std::fs::read_to_string(dashboard.scalars_path()).unwrap();
        assert_eq!(scalars.lines().count(), 8);
        assert!(scalars.contains("F1_Score/naive_bayes"));
    }

    #[test]
    fn test_same_seed_same_metrics() {
        let comparator = ModelComparator::new(ClassifierRegistry::with_defaults(7)).with_sample_fraction(Some(0.5));
        let a = comparator.compare(&frame(), "satisfaction", &["k_nearest_neighbors"]).unwrap();
        let b = comparator.compare(&frame(), "satisfaction", &["k_nearest_neighbors"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["k_nearest_neighbors"].n_samples, 8);
    }

    #[test]
    fn test_unknown_model_and_missing_target() {
        let comparator = ModelComparator::new(ClassifierRegistry::with_defaults(42));
        let err = comparator.compare(&frame(), "satisfaction", &["svm"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.stage(), Some(Stage::ModelComparator));

        let err = comparator.compare(&frame(), "label", &["naive_bayes"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
