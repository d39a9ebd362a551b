//! Experiment tracking and metrics dashboard collaborators
//!
//! Both are best-effort sinks: their failures are reported as
//! `ExternalCollaboratorError` and never abort a run.

pub mod dashboard;
pub mod tracker;

pub use dashboard::{FileDashboard, MetricsDashboard, NullDashboard};
pub use tracker::{ExperimentTracker, LocalTracker, NullTracker, RunRecord, RunStatus};
