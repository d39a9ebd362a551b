//! Satisfaction pipeline - airline passenger satisfaction classifier
//!
//! Turns a raw survey table into a persisted, tuned classifier:
//! - Column dropping, IQR outlier clipping and median imputation
//! - Derived delay features, age binning and label encoding
//! - Mutual-information feature selection
//! - Grid search with stratified cross-validation and held-out evaluation
//! - Side-by-side comparison of classifier families
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Cleaner, FeatureBuilder, LabelEncoder, FeatureSelector
//! - [`training`] - Classifier families, registry, splitting, metrics, comparison
//! - [`optimizer`] - Hyperparameter grid and the tuning state machine
//! - [`export`] - Model artifact persistence and serving-side prediction
//!
//! ## Infrastructure
//! - [`pipeline`] - Ingestion split and end-to-end runner
//! - [`tracking`] - Experiment tracker and metrics dashboard collaborators
//! - [`config`] - Pipeline configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod export;

// Infrastructure
pub mod pipeline;
pub mod tracking;
pub mod utils;

// Services
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ErrorKind, PipelineError, Result, Stage, StageContext};

    // Configuration
    pub use crate::config::PipelineConfig;

    // Preprocessing
    pub use crate::preprocessing::{
        AgeGroup, Cleaner, ColumnStats, FeatureBuilder, FeatureRanking, FeatureSelector, LabelEncoder, LabelMapping,
    };

    // Training
    pub use crate::training::{
        ClassificationMetrics, ClassifierRegistry, FittedModel, HyperParams, ModelComparator, ParamValue,
        TrainableClassifier,
    };

    // Optimization
    pub use crate::optimizer::{HyperparameterGrid, ModelTuner, TunerStage, TuningOutcome};

    // Export
    pub use crate::export::TrainedModel;

    // Experiment tracking
    pub use crate::tracking::{ExperimentTracker, FileDashboard, LocalTracker, MetricsDashboard, RunRecord};

    // Pipeline
    pub use crate::pipeline::{DataIngestion, PipelineRunner};
}
