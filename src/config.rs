//! Where the client finds the API and keeps its state.

use std::path::PathBuf;

use crate::pagination::PaginationConfig;

/// The API base URL used when none is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// The state database path used when none is configured.
pub const DEFAULT_STATE_PATH: &str = "finance_state.db";

/// The settings the client is started with.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// The URL every endpoint path is appended to, e.g.
    /// "http://localhost:8000/api".
    pub api_base_url: String,
    /// The SQLite database that holds the saved session, categories and
    /// transactions.
    pub state_path: PathBuf,
    /// How lists are paged.
    pub pagination: PaginationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            pagination: PaginationConfig::default(),
        }
    }
}
