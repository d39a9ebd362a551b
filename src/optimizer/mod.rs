//! Hyperparameter optimization
//!
//! Exhaustive grid search scored by stratified k-fold accuracy, wrapped by
//! [`ModelTuner`] which refits, evaluates and persists the winner.

pub mod grid;
pub mod search;
pub mod tuner;

pub use grid::HyperparameterGrid;
pub use search::{GridSearch, Study, TrialResult};
pub use tuner::{ModelTuner, TunerStage, TuningOutcome};
