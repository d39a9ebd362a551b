//! Data preprocessing module
//!
//! Turns raw survey rows into model-ready features:
//! - Column dropping, IQR outlier clipping and median imputation ([`Cleaner`])
//! - Derived delay features and age binning ([`FeatureBuilder`])
//! - Deterministic label encoding ([`LabelEncoder`])
//! - Mutual-information feature selection ([`FeatureSelector`])

pub mod cleaner;
pub mod encoder;
pub mod feature_selection;
pub mod features;
pub mod imputer;
pub mod outlier;

pub use cleaner::{Cleaner, ColumnStats};
pub use encoder::{LabelEncoder, LabelMapping};
pub use feature_selection::{FeatureRanking, FeatureSelector};
pub use features::{AgeGroup, FeatureBuilder};
pub use imputer::ImputeStrategy;
pub use outlier::OutlierBounds;
