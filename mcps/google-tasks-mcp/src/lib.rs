//! Google Tasks MCP Library
//!
//! Task lists and tasks of one Google account exposed as MCP tools. The user
//! consents once in the browser; the resulting refresh token is saved to
//! `token.json` and reused by every later operation and process.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use google_tasks_mcp::{Config, GoogleTasksMcpServer};
//!
//! let server = GoogleTasksMcpServer::new(&config, authorizer, api);
//! // Serve via stdio or an in-memory transport
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod handlers;
pub mod params;
pub mod server;
pub mod tasks;
#[cfg(test)]
mod tests;

pub use config::Config;
pub use server::GoogleTasksMcpServer;

// Re-export parameter types for direct API usage
pub use params::*;
