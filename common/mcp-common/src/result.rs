//! Result helpers for MCP tool responses
//!
//! Tools in this workspace answer with a single text item. Successful
//! structured answers are a short label followed by pretty-printed JSON;
//! failures are `isError: true` results rather than protocol errors, so the
//! client always receives a well-formed response.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Create a successful plain text response
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Create a successful response of the form `"<label>\n<pretty json>"`
///
/// Serialization failures are reported as an error result instead.
///
/// ```rust,ignore
/// labeled_json_success("Task Lists:", &lists)
/// ```
pub fn labeled_json_success<T: Serialize>(label: &str, data: &T) -> CallToolResult {
    match serde_json::to_string_pretty(data) {
        Ok(json) => text_success(format!("{}\n{}", label, json)),
        Err(e) => text_error(format!("Error serializing response: {}", e)),
    }
}

/// Create an error result carrying a plain text message
pub fn text_error(text: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text.into())])
}

/// Create the uniform failure result for a tool and log it
///
/// Produces `"Error <action>: <error>"`, e.g. `Error listing tasks: 404 Not Found`.
pub fn tool_failure(tool: &str, action: &str, error: &dyn std::fmt::Display) -> CallToolResult {
    tracing::error!(tool, "Error in {} tool: {}", tool, error);
    text_error(format!("Error {}: {}", action, error))
}
