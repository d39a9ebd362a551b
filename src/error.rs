//! Error types for the satisfaction pipeline

use std::fmt;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline component that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingestion,
    Cleaner,
    FeatureBuilder,
    FeatureSelector,
    ModelTuner,
    ModelComparator,
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingestion => "Ingestion",
            Stage::Cleaner => "Cleaner",
            Stage::FeatureBuilder => "FeatureBuilder",
            Stage::FeatureSelector => "FeatureSelector",
            Stage::ModelTuner => "ModelTuner",
            Stage::ModelComparator => "ModelComparator",
            Stage::Persistence => "Persistence",
        };
        f.write_str(name)
    }
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Insufficient features: requested {requested}, only {available} candidate columns")]
    InsufficientFeatures { requested: usize, available: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("External collaborator error: {0}")]
    ExternalCollaboratorError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("{stage} failed during {operation}: {source}")]
    Stage {
        stage: Stage,
        operation: &'static str,
        #[source]
        source: Box<PipelineError>,
    },
}

/// Tag identifying the kind of a [`PipelineError`], independent of stage wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Domain,
    InsufficientFeatures,
    Io,
    ExternalCollaborator,
    Data,
    Serialization,
    Config,
    InvalidParameter,
    Training,
    ModelNotFitted,
}

impl ErrorKind {
    /// Only collaborator failures may be swallowed by a run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::ExternalCollaborator)
    }
}

impl PipelineError {
    /// Kind of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SchemaError(_) => ErrorKind::Schema,
            PipelineError::DomainError(_) => ErrorKind::Domain,
            PipelineError::InsufficientFeatures { .. } => ErrorKind::InsufficientFeatures,
            PipelineError::IoError(_) => ErrorKind::Io,
            PipelineError::ExternalCollaboratorError(_) => ErrorKind::ExternalCollaborator,
            PipelineError::DataError(_) => ErrorKind::Data,
            PipelineError::SerializationError(_) => ErrorKind::Serialization,
            PipelineError::ConfigError(_) => ErrorKind::Config,
            PipelineError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            PipelineError::TrainingError(_) => ErrorKind::Training,
            PipelineError::ModelNotFitted => ErrorKind::ModelNotFitted,
            PipelineError::Stage { source, .. } => source.kind(),
        }
    }

    /// Outermost stage this error was attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Operation name recorded by the outermost stage wrapper.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            PipelineError::Stage { operation, .. } => Some(operation),
            _ => None,
        }
    }

    pub fn missing_column(name: &str) -> Self {
        PipelineError::SchemaError(format!("column '{}' not found", name))
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        match err {
            polars::error::PolarsError::ColumnNotFound(msg) => {
                PipelineError::SchemaError(msg.to_string())
            }
            polars::error::PolarsError::IO { error, .. } => {
                PipelineError::IoError(std::io::Error::new(error.kind(), error.to_string()))
            }
            other => PipelineError::DataError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::DataError(format!("invalid shape: {}", err))
    }
}

/// Attach stage context to a failing result.
pub trait StageContext<T> {
    fn in_stage(self, stage: Stage, operation: &'static str) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn in_stage(self, stage: Stage, operation: &'static str) -> Result<T> {
        self.map_err(|source| PipelineError::Stage {
            stage,
            operation,
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::SchemaError("column 'id' not found".to_string());
        assert_eq!(err.to_string(), "Schema error: column 'id' not found");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::IoError(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_stage_wrapping_keeps_kind() {
        let res: Result<()> = Err(PipelineError::DomainError("age 130".to_string()));
        let err = res
            .in_stage(Stage::FeatureBuilder, "bin_age")
            .in_stage(Stage::ModelTuner, "load")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Domain);
        assert_eq!(err.stage(), Some(Stage::ModelTuner));
        assert_eq!(err.operation(), Some("load"));
        assert!(err.to_string().contains("age 130"));
    }

    #[test]
    fn test_only_collaborator_errors_are_non_fatal() {
        let err = PipelineError::ExternalCollaboratorError("tracker down".to_string());
        assert!(!err.kind().is_fatal());
        assert!(PipelineError::ModelNotFitted.kind().is_fatal());
    }
}
