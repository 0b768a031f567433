//! MCP Common - Shared utilities for MCP servers
//!
//! - **Initialization**: [`init_tracing`] routes logs to stderr
//! - **Results**: helpers for building `CallToolResult` responses
//!
//! ```rust,ignore
//! use mcp_common::{labeled_json_success, tool_failure};
//!
//! match api.list_task_lists(&client, max).await {
//!     Ok(lists) => labeled_json_success("Task Lists:", &lists),
//!     Err(e) => tool_failure("list-task-lists", "listing task lists", &e),
//! }
//! ```

pub mod init;
pub mod result;

pub use init::{init_tracing, LogFormat};
pub use result::{labeled_json_success, text_error, text_success, tool_failure};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
