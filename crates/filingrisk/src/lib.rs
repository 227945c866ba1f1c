pub mod analyzer;
pub mod config;
pub mod db;
pub mod edgar;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod risk;

pub use analyzer::{AnalyzerError, GeminiClient, ModelTransport, RiskAnalyzer, RISK_CATEGORIES};
pub use config::{load_roster, RosterEntry, Settings};
pub use db::{Database, DatabaseError};
pub use edgar::{EdgarClient, FilingSource};
pub use error::{ConfigError, FilingriskError, Result};
pub use jobs::{JobOrchestrator, JobType, JobView, OrchestratorError};
pub use logging::init_tracing;
pub use risk::{company_risk_scores, overall, risk_summary, RiskSummary, Severity};
