//! Persisted model artifact
//!
//! A [`TrainedModel`] bundles the fitted model with everything a serving
//! caller needs to use it: the ordered feature names, the label mappings to
//! encode inputs and decode predictions, and the cleaning statistics.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::preprocessing::{ColumnStats, LabelMapping};
use crate::training::{ClassificationMetrics, FittedModel, HyperParams};
use crate::utils::{columns_to_array2, require_columns};

pub const FORMAT_VERSION: u32 = 1;

/// Fitted model plus the metadata needed to serve it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub format_version: u32,
    /// Registry name of the classifier family
    pub classifier: String,
    pub model: FittedModel,
    /// Feature columns in the order the model was trained on
    pub feature_names: Vec<String>,
    pub target_column: String,
    pub best_params: HyperParams,
    /// Mean cross-validated accuracy of `best_params`
    pub cv_score: f64,
    /// Held-out metrics
    pub metrics: ClassificationMetrics,
    #[serde(default)]
    pub label_mappings: BTreeMap<String, LabelMapping>,
    #[serde(default)]
    pub column_stats: Option<ColumnStats>,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub fn new(
        classifier: impl Into<String>,
        model: FittedModel,
        feature_names: Vec<String>,
        target_column: impl Into<String>,
        best_params: HyperParams,
        cv_score: f64,
        metrics: ClassificationMetrics,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            classifier: classifier.into(),
            model,
            feature_names,
            target_column: target_column.into(),
            best_params,
            cv_score,
            metrics,
            label_mappings: BTreeMap::new(),
            column_stats: None,
            trained_at: Utc::now(),
        }
    }

    pub fn with_label_mappings(mut self, mappings: BTreeMap<String, LabelMapping>) -> Self {
        self.label_mappings = mappings;
        self
    }

    pub fn with_column_stats(mut self, stats: ColumnStats) -> Self {
        self.column_stats = Some(stats);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the artifact, replacing any existing file at `path`.
    ///
    /// Writes to a sibling temp file first so a crash never leaves a
    /// truncated artifact behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), classifier = %self.classifier, "model artifact saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        if model.format_version != FORMAT_VERSION {
            return Err(PipelineError::SerializationError(format!(
                "artifact format {} is not supported (expected {})",
                model.format_version, FORMAT_VERSION
            )));
        }
        Ok(model)
    }

    /// Predict codes for a matrix whose columns follow `feature_names`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x.ncols())?;
        self.model.predict(x)
    }

    /// Predict codes for a table, picking the stored features by name.
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Array1<f64>> {
        require_columns(df, &self.feature_names)?;
        self.predict(&columns_to_array2(df, &self.feature_names)?)
    }

    /// Predict the code for one feature vector in stored feature order.
    pub fn predict_vector(&self, features: &[f64]) -> Result<i64> {
        self.check_width(features.len())?;
        let code = self.model.predict_row(ArrayView1::from(features))?;
        Ok(code.round() as i64)
    }

    /// Original target value for a predicted code.
    pub fn decode_target(&self, code: i64) -> Result<&str> {
        let mapping = self.label_mappings.get(&self.target_column).ok_or_else(|| {
            PipelineError::SchemaError(format!("artifact has no label mapping for '{}'", self.target_column))
        })?;
        mapping
            .decode(code)
            .ok_or_else(|| PipelineError::DomainError(format!("code {} is not a known '{}' label", code, self.target_column)))
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.feature_names.len() {
            return Err(PipelineError::SchemaError(format!(
                "expected {} features ({}), got {}",
                self.feature_names.len(),
                self.feature_names.join(", "),
                width
            )));
        }
        Ok(())
    }
}
