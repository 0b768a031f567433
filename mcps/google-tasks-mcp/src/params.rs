//! Parameter definitions for google-tasks-mcp tools
//!
//! Wire names are camelCase (`taskListId`, `taskTitle`, ...).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Task Lists
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskListParams {
    /// Title of the new task list
    pub task_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskListParams {
    /// ID of the task list to update
    pub task_list_id: String,
    /// New title for the task list
    pub task_list_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskListIdParams {
    /// ID of the task list
    pub task_list_id: String,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchTasksParams {
    /// ID of the task list to search in
    pub task_list_id: String,
    /// Search query for tasks
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskParams {
    /// ID of the task list to create the task in
    pub task_list_id: String,
    /// Title of the new task
    pub task_title: String,
    /// Notes for the new task
    #[serde(default)]
    pub task_notes: Option<String>,
    /// Due date for the new task in ISO format (YYYY-MM-DD)
    #[serde(default)]
    pub task_due: Option<String>,
    /// Status of the new task (needsAction or completed)
    #[serde(default)]
    pub task_status: Option<String>,
    /// ID of the parent task if this is a subtask
    #[serde(default)]
    pub task_parent: Option<String>,
}

/// Identifies one task within a list
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskRefParams {
    /// ID of the task list containing the task
    pub task_list_id: String,
    /// ID of the task
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskParams {
    /// ID of the task list containing the task to update
    pub task_list_id: String,
    /// ID of the task to update
    pub task_id: String,
    /// New title for the task
    pub task_title: String,
    /// New notes for the task
    #[serde(default)]
    pub task_notes: Option<String>,
    /// New due date for the task in ISO format (YYYY-MM-DD)
    #[serde(default)]
    pub task_due: Option<String>,
    /// ID of the parent task if this is a subtask
    #[serde(default)]
    pub task_parent: Option<String>,
}
