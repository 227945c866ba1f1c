use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilingriskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] crate::analyzer::AnalyzerError),

    #[error("Job error: {0}")]
    Job(#[from] crate::jobs::OrchestratorError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FilingriskError>;
