//! Configuration for google-tasks-mcp
//!
//! Built once at startup (see [`crate::cli::Cli::into_config`]) and handed to
//! the authorizer and dispatcher constructors. Nothing here is global.

use std::path::{Path, PathBuf};

/// OAuth scope requested during consent. Task read/write only.
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

pub const DEFAULT_API_BASE_URL: &str = "https://tasks.googleapis.com/tasks/v1";
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";
pub const TOKEN_FILE_NAME: &str = "token.json";

pub const DEFAULT_MAX_RESULTS: u32 = 100;
pub const MIN_MAX_RESULTS: u32 = 10;
pub const MAX_MAX_RESULTS: u32 = 2000;

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Application credentials downloaded from the Google Cloud console (read-only)
    pub credentials_path: PathBuf,
    /// Persisted `authorized_user` record
    pub token_path: PathBuf,
    /// Page size for list calls, already clamped
    pub max_results: u32,
    /// Google Tasks API root, without trailing slash
    pub api_base_url: String,
    /// Launch the system browser during consent
    pub open_browser: bool,
}

impl Config {
    /// Configuration rooted at `install_dir` with default settings
    pub fn for_install_dir(install_dir: &Path) -> Self {
        Self {
            credentials_path: install_dir.join(CREDENTIALS_FILE_NAME),
            token_path: install_dir.join(TOKEN_FILE_NAME),
            max_results: DEFAULT_MAX_RESULTS,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            open_browser: true,
        }
    }
}

/// Directory containing the running executable, falling back to the
/// working directory.
pub fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the raw `MAX_TASK_RESULTS` value
///
/// Unset means the default; integers are clamped to
/// [`MIN_MAX_RESULTS`, `MAX_MAX_RESULTS`]; anything else falls back to the
/// default with a warning.
pub fn resolve_max_results(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_MAX_RESULTS;
    };

    match raw.parse::<i64>() {
        Ok(value) => value.clamp(MIN_MAX_RESULTS as i64, MAX_MAX_RESULTS as i64) as u32,
        Err(_) => {
            tracing::warn!(
                "Ignoring non-integer MAX_TASK_RESULTS value {:?}, using {}",
                raw,
                DEFAULT_MAX_RESULTS
            );
            DEFAULT_MAX_RESULTS
        }
    }
}
