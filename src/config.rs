//! Pipeline configuration
//!
//! One [`PipelineConfig`] is threaded through every stage. Every section
//! deserializes with defaults, so a JSON file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::preprocessing::ImputeStrategy;
use crate::training::{HyperParams, ParamValue};

/// File locations for inputs, intermediates and artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    pub train_data: PathBuf,
    pub test_data: PathBuf,
    pub processed_data: PathBuf,
    pub engineered_data: PathBuf,
    /// Hyperparameter grid file
    pub params: PathBuf,
    pub model: PathBuf,
    pub tracking_dir: PathBuf,
    pub dashboard_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("artifacts/raw/data.csv"),
            train_data: PathBuf::from("artifacts/ingested_data/train.csv"),
            test_data: PathBuf::from("artifacts/ingested_data/test.csv"),
            processed_data: PathBuf::from("artifacts/processed_data/processed_train.csv"),
            engineered_data: PathBuf::from("artifacts/engineered_data/final_df.csv"),
            params: PathBuf::from("config/params.json"),
            model: PathBuf::from("artifacts/models/trained_model.json"),
            tracking_dir: PathBuf::from("artifacts/experiments"),
            dashboard_dir: PathBuf::from("artifacts/dashboard_logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub test_size: f64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { test_size: 0.2 }
    }
}

/// Column lists and strategy for the [`Cleaner`](crate::preprocessing::Cleaner)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub drop_columns: Vec<String>,
    pub outlier_columns: Vec<String>,
    pub impute_column: String,
    pub impute_strategy: ImputeStrategy,
    /// Multiplier on the interquartile range for clipping bounds
    pub iqr_factor: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            drop_columns: vec!["MyUnknownColumn".to_string(), "id".to_string()],
            outlier_columns: vec![
                "Flight Distance".to_string(),
                "Departure Delay in Minutes".to_string(),
                "Arrival Delay in Minutes".to_string(),
                "Checkin service".to_string(),
            ],
            impute_column: "Arrival Delay in Minutes".to_string(),
            impute_strategy: ImputeStrategy::Median,
            iqr_factor: 1.5,
        }
    }
}

/// Source and derived column names used by the
/// [`FeatureBuilder`](crate::preprocessing::FeatureBuilder)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub departure_delay: String,
    pub arrival_delay: String,
    pub flight_distance: String,
    pub age: String,
    pub total_delay: String,
    pub delay_ratio: String,
    pub age_group: String,
    pub categorical_columns: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            departure_delay: "Departure Delay in Minutes".to_string(),
            arrival_delay: "Arrival Delay in Minutes".to_string(),
            flight_distance: "Flight Distance".to_string(),
            age: "Age".to_string(),
            total_delay: "Total Delay".to_string(),
            delay_ratio: "Delay Ratio".to_string(),
            age_group: "Age Group".to_string(),
            categorical_columns: vec![
                "Gender".to_string(),
                "Customer Type".to_string(),
                "Type of Travel".to_string(),
                "Class".to_string(),
                "satisfaction".to_string(),
                "Age Group".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of features kept besides the target
    pub k: usize,
    /// Held-out fraction of the ranking-only split
    pub test_size: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { k: 12, test_size: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Registry name of the classifier family to search
    pub classifier: String,
    pub test_size: f64,
    pub cv_folds: usize,
    pub experiment_name: String,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            classifier: "gradient_boosting".to_string(),
            test_size: 0.2,
            cv_folds: 3,
            experiment_name: "Model_Training_Experiment".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Fraction of rows kept before splitting; `None` uses the full table
    pub sample_fraction: Option<f64>,
    pub test_size: f64,
    pub models: Vec<String>,
    /// Per-model hyperparameters overriding the family defaults
    pub params: BTreeMap<String, HyperParams>,
    pub experiment_name: String,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        let mut params = BTreeMap::new();
        for name in ["random_forest", "gradient_boosting"] {
            let mut hp = HyperParams::new();
            hp.insert("n_estimators", ParamValue::Int(50));
            params.insert(name.to_string(), hp);
        }

        Self {
            sample_fraction: Some(0.1),
            test_size: 0.2,
            models: crate::training::ClassifierRegistry::DEFAULT_ORDER
                .iter()
                .map(|s| s.to_string())
                .collect(),
            params,
            experiment_name: "Model_Selection_Experiment".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub enabled: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration for a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed for every split and every seeded learner
    pub random_state: u64,
    pub target_column: String,
    pub paths: PathsConfig,
    pub ingestion: IngestionConfig,
    pub cleaning: CleaningConfig,
    pub features: FeatureConfig,
    pub selection: SelectionConfig,
    pub tuning: TuningConfig,
    pub comparison: ComparisonConfig,
    pub tracking: TrackingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            random_state: 42,
            target_column: "satisfaction".to_string(),
            paths: PathsConfig::default(),
            ingestion: IngestionConfig::default(),
            cleaning: CleaningConfig::default(),
            features: FeatureConfig::default(),
            selection: SelectionConfig::default(),
            tuning: TuningConfig::default(),
            comparison: ComparisonConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check value ranges that the stages rely on.
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("ingestion.test_size", self.ingestion.test_size),
            ("selection.test_size", self.selection.test_size),
            ("tuning.test_size", self.tuning.test_size),
            ("comparison.test_size", self.comparison.test_size),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value < 1.0) {
                return Err(PipelineError::ConfigError(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if let Some(frac) = self.comparison.sample_fraction {
            if !(frac > 0.0 && frac <= 1.0) {
                return Err(PipelineError::ConfigError(format!(
                    "comparison.sample_fraction must be in (0, 1], got {}",
                    frac
                )));
            }
        }
        if self.selection.k == 0 {
            return Err(PipelineError::ConfigError("selection.k must be positive".to_string()));
        }
        if self.tuning.cv_folds < 2 {
            return Err(PipelineError::ConfigError(format!(
                "tuning.cv_folds must be at least 2, got {}",
                self.tuning.cv_folds
            )));
        }
        if self.cleaning.iqr_factor < 0.0 {
            return Err(PipelineError::ConfigError("cleaning.iqr_factor must be non-negative".to_string()));
        }
        if self.target_column.is_empty() {
            return Err(PipelineError::ConfigError("target_column must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.paths = PathsConfig {
            raw_data: dir.join("raw/data.csv"),
            train_data: dir.join("ingested_data/train.csv"),
            test_data: dir.join("ingested_data/test.csv"),
            processed_data: dir.join("processed_data/processed_train.csv"),
            engineered_data: dir.join("engineered_data/final_df.csv"),
            params: self.paths.params,
            model: dir.join("models/trained_model.json"),
            tracking_dir: dir.join("experiments"),
            dashboard_dir: dir.join("dashboard_logs"),
        };
        self
    }

    pub fn with_params_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.params = path.into();
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.selection.k = k;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.tuning.cv_folds = folds;
        self
    }

    pub fn with_classifier(mut self, name: impl Into<String>) -> Self {
        self.tuning.classifier = name.into();
        self
    }

    pub fn with_sample_fraction(mut self, fraction: Option<f64>) -> Self {
        self.comparison.sample_fraction = fraction;
        self
    }

    pub fn with_tracking(mut self, enabled: bool) -> Self {
        self.tracking.enabled = enabled;
        self
    }
}
