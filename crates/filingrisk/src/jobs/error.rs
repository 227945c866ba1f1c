//! Orchestrator error types.

use thiserror::Error;

use super::JobType;
use crate::analyzer::AnalyzerError;
use crate::db::DatabaseError;
use crate::error::ConfigError;

/// Errors from job orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A job of this type is already active; no new job was created.
    #[error("A {0} job is already running")]
    JobAlreadyRunning(JobType),

    /// The pipeline thread could not be spawned.
    #[error("Failed to spawn pipeline thread: {0}")]
    Spawn(String),

    /// The referenced filing does not exist.
    #[error("Filing {0} not found")]
    FilingNotFound(i64),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}
