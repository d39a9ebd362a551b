//! Metrics dashboard collaborator for model comparison

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::training::ConfusionMatrix;

/// Receives per-model scalars and confusion matrices
pub trait MetricsDashboard: Send + Sync {
    fn log_scalar(&self, tag: &str, value: f64, step: usize) -> Result<()>;
    fn log_confusion_matrix(&self, model: &str, matrix: &ConfusionMatrix, step: usize) -> Result<()>;
}

#[derive(Serialize)]
struct ScalarEvent<'a> {
    tag: &'a str,
    value: f64,
    step: usize,
    wall_time: String,
}

/// Appends scalars to `scalars.jsonl` and writes one text matrix per model
#[derive(Debug, Clone)]
pub struct FileDashboard {
    log_dir: PathBuf,
}

impl FileDashboard {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub fn scalars_path(&self) -> PathBuf {
        self.log_dir.join("scalars.jsonl")
    }

    pub fn matrix_path(&self, model: &str) -> PathBuf {
        self.log_dir.join(format!("confusion_matrix_{}.txt", model))
    }

    fn unreachable(e: impl std::fmt::Display) -> PipelineError {
        PipelineError::ExternalCollaboratorError(format!("metrics dashboard: {}", e))
    }
}

impl MetricsDashboard for FileDashboard {
    fn log_scalar(&self, tag: &str, value: f64, step: usize) -> Result<()> {
        fs::create_dir_all(&self.log_dir).map_err(Self::unreachable)?;
        let event = ScalarEvent {
            tag,
            value,
            step,
            wall_time: Utc::now().to_rfc3339(),
        };
        let line = serde_json::to_string(&event).map_err(Self::unreachable)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.scalars_path())
            .map_err(Self::unreachable)?;
        writeln!(file, "{}", line).map_err(Self::unreachable)
    }

    fn log_confusion_matrix(&self, model: &str, matrix: &ConfusionMatrix, step: usize) -> Result<()> {
        fs::create_dir_all(&self.log_dir).map_err(Self::unreachable)?;
        let text = format!("Confusion Matrix: {} (step {})\n{}", model, step, matrix);
        fs::write(self.matrix_path(model), text).map_err(Self::unreachable)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullDashboard;

impl MetricsDashboard for NullDashboard {
    fn log_scalar(&self, _tag: &str, _value: f64, _step: usize) -> Result<()> {
        Ok(())
    }

    fn log_confusion_matrix(&self, _model: &str, _matrix: &ConfusionMatrix, _step: usize) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_dashboard_appends() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = FileDashboard::new(dir.path().join("logs"));
        dashboard.log_scalar("Accuracy/naive_bayes", 0.8, 0).unwrap();
        dashboard.log_scalar("F1_Score/naive_bayes", 0.7, 0).unwrap();

        let contents = fs::read_to_string(dashboard.scalars_path()).unwrap();
        let lines: Vec<serde_json::Value> = contents.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["tag"], "F1_Score/naive_bayes");

        let cm = ConfusionMatrix::compute(&[0, 1], &[0, 0]);
        dashboard.log_confusion_matrix("naive_bayes", &cm, 0).unwrap();
        assert!(fs::read_to_string(dashboard.matrix_path("naive_bayes"))
            .unwrap()
            .contains("naive_bayes"));
    }
}
