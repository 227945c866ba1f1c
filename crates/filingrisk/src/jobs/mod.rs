//! Background job orchestration: the fetch and analyze pipelines.

pub mod error;
pub mod orchestrator;

use serde::Serialize;

pub use error::OrchestratorError;
pub use orchestrator::JobOrchestrator;

use crate::db::job_repo::JobRow;

/// The two pipeline job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Fetch,
    Analyze,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Fetch => "fetch",
            JobType::Analyze => "analyze",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job as reported through the status/history surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub total_items: u64,
    pub completed_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub created_at: String,
}

impl From<JobRow> for JobView {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            job_type: row.job_type,
            status: row.status,
            total_items: row.total_items,
            completed_items: row.completed_items,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}
