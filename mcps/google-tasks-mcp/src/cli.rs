//! Command line for the google-tasks-mcp binary
//!
//! Every flag has an environment fallback so the server can be configured
//! from an `.mcp.json` `env` block.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{install_dir, resolve_max_results, Config};

#[derive(Debug, Parser)]
#[command(name = "google-tasks-mcp")]
#[command(about = "Google Tasks MCP server (stdio)")]
pub struct Cli {
    /// Application credentials file (default: credentials.json next to the binary)
    #[arg(long, env = "GOOGLE_TASKS_CREDENTIALS_PATH")]
    pub credentials: Option<PathBuf>,

    /// Persisted authorization file (default: token.json next to the binary)
    #[arg(long, env = "GOOGLE_TASKS_TOKEN_PATH")]
    pub token: Option<PathBuf>,

    /// Maximum results per list call, clamped to [10, 2000]
    #[arg(long, env = "MAX_TASK_RESULTS")]
    pub max_results: Option<String>,

    /// Google Tasks API base URL
    #[arg(long, env = "GOOGLE_TASKS_API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Print the consent URL instead of opening a browser
    #[arg(long, env = "GOOGLE_TASKS_NO_BROWSER")]
    pub no_browser: bool,
}

impl Cli {
    pub fn into_config(self) -> Config {
        let mut config = Config::for_install_dir(&install_dir());

        if let Some(path) = self.credentials {
            config.credentials_path = path;
        }
        if let Some(path) = self.token {
            config.token_path = path;
        }
        if let Some(url) = self.api_base_url {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        config.max_results = resolve_max_results(self.max_results.as_deref());
        config.open_browser = !self.no_browser;

        config
    }
}
