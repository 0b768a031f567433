//! MCP Server implementation for Google Tasks
//!
//! This module registers the tools; the work is done by
//! [`crate::handlers::Dispatcher`].

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use std::sync::Arc;

use crate::auth::Authorizer;
use crate::config::Config;
use crate::handlers::Dispatcher;
use crate::params::*;
use crate::tasks::TasksApi;

/// The main Google Tasks MCP Server
#[derive(Clone)]
pub struct GoogleTasksMcpServer {
    dispatcher: Arc<Dispatcher>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to the dispatcher
// ============================================================================

#[tool_router]
impl GoogleTasksMcpServer {
    pub fn new(config: &Config, authorizer: Arc<Authorizer>, api: Arc<dyn TasksApi>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(config, authorizer, api)),
            tool_router: Self::tool_router(),
        }
    }

    // ========================================================================
    // Task Lists
    // ========================================================================

    #[tool(name = "list-task-lists", description = "List all task lists in Google Tasks")]
    async fn list_task_lists(&self) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.list_task_lists().await)
    }

    #[tool(
        name = "create-task-list",
        description = "Create a new task list in Google Tasks"
    )]
    async fn create_task_list(
        &self,
        Parameters(params): Parameters<CreateTaskListParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.create_task_list(params).await)
    }

    #[tool(
        name = "update-task-list",
        description = "Update an existing task list in Google Tasks"
    )]
    async fn update_task_list(
        &self,
        Parameters(params): Parameters<UpdateTaskListParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.update_task_list(params).await)
    }

    #[tool(name = "delete-task-list", description = "Delete a task list in Google Tasks")]
    async fn delete_task_list(
        &self,
        Parameters(params): Parameters<TaskListIdParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.delete_task_list(params).await)
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    #[tool(name = "list-tasks", description = "List tasks in a specific task list")]
    async fn list_tasks(
        &self,
        Parameters(params): Parameters<TaskListIdParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.list_tasks(params).await)
    }

    #[tool(
        name = "search-tasks",
        description = "Search for tasks in Google Tasks (case-insensitive match on title or notes)"
    )]
    async fn search_tasks(
        &self,
        Parameters(params): Parameters<SearchTasksParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.search_tasks(params).await)
    }

    #[tool(
        name = "create-task",
        description = "Create a new task in a specific task list"
    )]
    async fn create_task(
        &self,
        Parameters(params): Parameters<CreateTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.create_task(params).await)
    }

    #[tool(
        name = "get-task",
        description = "Get details of a specific task from a task list"
    )]
    async fn get_task(
        &self,
        Parameters(params): Parameters<TaskRefParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.get_task(params).await)
    }

    #[tool(
        name = "update-task",
        description = "Update an existing task in a specific task list"
    )]
    async fn update_task(
        &self,
        Parameters(params): Parameters<UpdateTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.update_task(params).await)
    }

    #[tool(name = "delete-task", description = "Delete a task from a specific task list")]
    async fn delete_task(
        &self,
        Parameters(params): Parameters<TaskRefParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.delete_task(params).await)
    }

    #[tool(name = "clear-tasks", description = "Clear all tasks from a specific task list")]
    async fn clear_tasks(
        &self,
        Parameters(params): Parameters<TaskListIdParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.clear_tasks(params).await)
    }

    #[tool(
        name = "complete-task",
        description = "Mark a task as completed in a specific task list"
    )]
    async fn complete_task(
        &self,
        Parameters(params): Parameters<TaskRefParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.complete_task(params).await)
    }

    #[tool(
        name = "reopen-task",
        description = "Reopen a completed task in a specific task list"
    )]
    async fn reopen_task(
        &self,
        Parameters(params): Parameters<TaskRefParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatcher.reopen_task(params).await)
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for GoogleTasksMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Google Tasks MCP server: manage task lists and tasks for the authorized Google account. \
                 Authorization is requested once in the browser and reused from token.json afterwards."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
