//! Runtime configuration loaded from the environment.

pub mod roster;

use std::path::PathBuf;

pub use roster::{load_roster, RosterEntry};

/// Default SEC user agent when none is configured. The SEC requires a
/// contact address in the User-Agent header of EDGAR requests.
const DEFAULT_SEC_USER_AGENT: &str = "filingrisk contact@example.com";

/// Default roster file of target companies.
const DEFAULT_ROSTER_PATH: &str = "data/sp100_companies.json";

/// Runtime settings for the service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database location.
    pub database_path: PathBuf,
    /// User-Agent sent with EDGAR requests.
    pub sec_user_agent: String,
    /// Gemini API key. Absence is a fatal configuration error for the
    /// analyze pipeline, checked at job start rather than here.
    pub gemini_api_key: Option<String>,
    /// JSON roster of target companies for the fetch pipeline.
    pub roster_path: PathBuf,
}

impl Settings {
    /// Loads settings from environment variables, falling back to
    /// defaults for everything except the API key (which has none).
    pub fn from_env() -> Self {
        let database_path = std::env::var("FILINGRISK_DATABASE_PATH")
            .map(PathBuf::from)
            .ok()
            .or_else(crate::db::default_database_path)
            .unwrap_or_else(|| PathBuf::from("filingrisk.db"));

        let sec_user_agent = std::env::var("SEC_USER_AGENT")
            .unwrap_or_else(|_| DEFAULT_SEC_USER_AGENT.to_string());

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let roster_path = std::env::var("FILINGRISK_ROSTER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROSTER_PATH));

        Self {
            database_path,
            sec_user_agent,
            gemini_api_key,
            roster_path,
        }
    }
}
