//! Roster of target companies for the fetch pipeline.
//!
//! The roster file is a JSON object: `{"companies": [{"ticker": "AAPL",
//! "sector": "Technology"}, ...]}`. Sector is an optional hint used when
//! the registry lookup provides none.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// One roster entry: a ticker plus an optional sector hint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub ticker: String,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    companies: Vec<RosterEntry>,
}

/// Loads the roster from the given path, preserving file order.
pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parsed: RosterFile = serde_json::from_str(&contents)?;

    tracing::info!(count = parsed.companies.len(), "Company roster loaded");
    Ok(parsed.companies)
}
