//! Ingestion and end-to-end orchestration

pub mod ingestion;
pub mod runner;

pub use ingestion::{DataIngestion, IngestionSummary};
pub use runner::{PipelineReport, PipelineRunner, PreparedData};
