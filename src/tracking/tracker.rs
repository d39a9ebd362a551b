//! Experiment tracking collaborator
//!
//! A run is one write of parameters, metrics and an optional model blob.
//! Tracker failures surface as `ExternalCollaboratorError` so callers can
//! report them without failing the pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Finished,
    Failed,
}

/// One tracked run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Serialized model, when the run produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_blob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunRecord {
    /// Start a record with a fresh run id and the current time.
    pub fn new(experiment: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            experiment: experiment.into(),
            status: RunStatus::Finished,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            model_blob: None,
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn log_param(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), value.to_string());
    }

    pub fn log_metric(&mut self, key: impl Into<String>, value: f64) {
        self.metrics.insert(key.into(), value);
    }

    pub fn with_model_blob(mut self, blob: String) -> Self {
        self.model_blob = Some(blob);
        self
    }

    pub fn finish(mut self) -> Self {
        self.status = RunStatus::Finished;
        self.finished_at = Utc::now();
        self
    }

    pub fn fail(mut self, error: &PipelineError) -> Self {
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
        self.finished_at = Utc::now();
        self
    }
}

/// Sink for run records
pub trait ExperimentTracker: Send + Sync {
    fn log_run(&self, run: &RunRecord) -> Result<()>;
}

/// Writes `<base_dir>/<experiment>/<run_id>/run.json` (+ `model.json`)
#[derive(Debug, Clone)]
pub struct LocalTracker {
    base_dir: PathBuf,
}

impl LocalTracker {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn run_dir(&self, run: &RunRecord) -> PathBuf {
        self.base_dir.join(sanitize(&run.experiment)).join(&run.run_id)
    }

    /// Read back every run recorded under `experiment`, oldest first.
    pub fn load_runs(&self, experiment: &str) -> Result<Vec<RunRecord>> {
        let dir = self.base_dir.join(sanitize(experiment));
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let run_dir = entry?.path();
            let path = run_dir.join("run.json");
            if path.is_file() {
                let mut record: RunRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;
                let model_path = run_dir.join("model.json");
                if model_path.is_file() {
                    record.model_blob = Some(fs::read_to_string(&model_path)?);
                }
                runs.push(record);
            }
        }
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }

    fn write(&self, run: &RunRecord) -> Result<PathBuf> {
        let dir = self.run_dir(run);
        fs::create_dir_all(&dir)?;

        let mut record = run.clone();
        if let Some(blob) = record.model_blob.take() {
            write_file(&dir.join("model.json"), &blob)?;
        }
        write_file(&dir.join("run.json"), &serde_json::to_string_pretty(&record)?)?;
        Ok(dir)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)?;
    Ok(())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl ExperimentTracker for LocalTracker {
    fn log_run(&self, run: &RunRecord) -> Result<()> {
        let dir = self
            .write(run)
            .map_err(|e| PipelineError::ExternalCollaboratorError(format!("experiment tracker: {}", e)))?;
        debug!(run_id = %run.run_id, dir = %dir.display(), "tracked run");
        Ok(())
    }
}

/// Discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracker;

impl ExperimentTracker for NullTracker {
    fn log_run(&self, _run: &RunRecord) -> Result<()> {
        Ok(())
    }
}
