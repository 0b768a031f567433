//! Handler implementations for google-tasks-mcp tools
//!
//! Every operation asks the [`Authorizer`] for a client once, issues one
//! remote call and turns the outcome into a `CallToolResult`. Failures of
//! any kind become `isError` results; nothing here returns a protocol error.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use mcp_common::{labeled_json_success, text_success, tool_failure, CallToolResult};
use std::future::Future;
use std::sync::Arc;

use crate::auth::{AuthorizedClient, Authorizer};
use crate::config::Config;
use crate::params::*;
use crate::tasks::{ApiError, ApiResult, NewTask, TaskPatch, TaskStatus, TasksApi};

pub struct Dispatcher {
    authorizer: Arc<Authorizer>,
    api: Arc<dyn TasksApi>,
    max_results: u32,
}

impl Dispatcher {
    pub fn new(config: &Config, authorizer: Arc<Authorizer>, api: Arc<dyn TasksApi>) -> Self {
        Self {
            authorizer,
            api,
            max_results: config.max_results,
        }
    }

    /// Authorize, run `call`, and map any failure to `"Error <action>: ..."`
    async fn run<F, Fut>(&self, tool: &str, action: &str, call: F) -> CallToolResult
    where
        F: FnOnce(Arc<AuthorizedClient>) -> Fut,
        Fut: Future<Output = ApiResult<CallToolResult>>,
    {
        let client = match self.authorizer.authorize().await {
            Ok(client) => client,
            Err(e) => {
                self.authorizer.report_failure(&e).await;
                return tool_failure(tool, action, &e);
            }
        };

        match call(client).await {
            Ok(result) => result,
            Err(e) => {
                if let ApiError::Auth(auth) = &e {
                    self.authorizer.report_failure(auth).await;
                }
                tool_failure(tool, action, &e)
            }
        }
    }

    // ========================================================================
    // Task Lists
    // ========================================================================

    pub async fn list_task_lists(&self) -> CallToolResult {
        self.run("list-task-lists", "listing task lists", |auth| async move {
            let lists = self.api.list_task_lists(&auth, self.max_results).await?;
            Ok(labeled_json_success("Task Lists:", &lists))
        })
        .await
    }

    pub async fn create_task_list(&self, params: CreateTaskListParams) -> CallToolResult {
        self.run("create-task-list", "creating task list", |auth| async move {
            let list = self.api.insert_task_list(&auth, &params.task_title).await?;
            Ok(labeled_json_success("Task List created successfully:", &list))
        })
        .await
    }

    pub async fn update_task_list(&self, params: UpdateTaskListParams) -> CallToolResult {
        self.run("update-task-list", "updating task list", |auth| async move {
            let list = self
                .api
                .patch_task_list(&auth, &params.task_list_id, &params.task_list_title)
                .await?;
            Ok(labeled_json_success("Task List updated successfully:", &list))
        })
        .await
    }

    pub async fn delete_task_list(&self, params: TaskListIdParams) -> CallToolResult {
        self.run("delete-task-list", "deleting task list", |auth| async move {
            self.api.delete_task_list(&auth, &params.task_list_id).await?;
            Ok(text_success(format!(
                "Task List with ID {} deleted successfully.",
                params.task_list_id
            )))
        })
        .await
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub async fn list_tasks(&self, params: TaskListIdParams) -> CallToolResult {
        self.run("list-tasks", "listing tasks", |auth| async move {
            let tasks = self
                .api
                .list_tasks(&auth, &params.task_list_id, self.max_results)
                .await?;
            Ok(labeled_json_success(
                &format!("Tasks in Task List ID {}:", params.task_list_id),
                &tasks,
            ))
        })
        .await
    }

    /// Filtering happens locally on one page of results
    pub async fn search_tasks(&self, params: SearchTasksParams) -> CallToolResult {
        self.run("search-tasks", "searching tasks", |auth| async move {
            let tasks = self
                .api
                .list_tasks(&auth, &params.task_list_id, self.max_results)
                .await?;
            let matches: Vec<_> = tasks
                .into_iter()
                .filter(|t| t.matches_query(&params.query))
                .collect();
            Ok(labeled_json_success(
                &format!("Search results for \"{}\":", params.query),
                &matches,
            ))
        })
        .await
    }

    pub async fn create_task(&self, params: CreateTaskParams) -> CallToolResult {
        self.run("create-task", "creating task", |auth| async move {
            let status = match params.task_status.as_deref() {
                None | Some("") => TaskStatus::NeedsAction,
                Some(raw) => raw.parse::<TaskStatus>().map_err(ApiError::InvalidInput)?,
            };
            let task = NewTask {
                title: params.task_title,
                notes: params.task_notes,
                due: optional_due(params.task_due.as_deref())?,
                status: status.as_str().to_string(),
                parent: params.task_parent,
            };

            let created = self
                .api
                .insert_task(&auth, &params.task_list_id, &task)
                .await?;
            Ok(labeled_json_success("Task created successfully:", &created))
        })
        .await
    }

    pub async fn get_task(&self, params: TaskRefParams) -> CallToolResult {
        self.run("get-task", "retrieving task", |auth| async move {
            let task = self
                .api
                .get_task(&auth, &params.task_list_id, &params.task_id)
                .await?;
            Ok(labeled_json_success("Task details:", &task))
        })
        .await
    }

    pub async fn update_task(&self, params: UpdateTaskParams) -> CallToolResult {
        self.run("update-task", "updating task", |auth| async move {
            let patch = TaskPatch {
                title: Some(params.task_title),
                notes: params.task_notes,
                due: optional_due(params.task_due.as_deref())?,
                status: None,
                parent: params.task_parent,
            };

            let updated = self
                .api
                .patch_task(&auth, &params.task_list_id, &params.task_id, &patch)
                .await?;
            Ok(labeled_json_success("Task updated successfully:", &updated))
        })
        .await
    }

    pub async fn delete_task(&self, params: TaskRefParams) -> CallToolResult {
        self.run("delete-task", "deleting task", |auth| async move {
            self.api
                .delete_task(&auth, &params.task_list_id, &params.task_id)
                .await?;
            Ok(text_success(format!(
                "Task with ID {} deleted successfully from Task List ID {}.",
                params.task_id, params.task_list_id
            )))
        })
        .await
    }

    pub async fn clear_tasks(&self, params: TaskListIdParams) -> CallToolResult {
        self.run("clear-tasks", "clearing tasks", |auth| async move {
            self.api.clear_tasks(&auth, &params.task_list_id).await?;
            Ok(text_success(format!(
                "All tasks cleared successfully from Task List ID {}.",
                params.task_list_id
            )))
        })
        .await
    }

    pub async fn complete_task(&self, params: TaskRefParams) -> CallToolResult {
        self.run("complete-task", "completing task", |auth| async move {
            self.api
                .patch_task(
                    &auth,
                    &params.task_list_id,
                    &params.task_id,
                    &TaskPatch::status(TaskStatus::Completed),
                )
                .await?;
            Ok(text_success(format!(
                "Task with ID {} marked as completed.",
                params.task_id
            )))
        })
        .await
    }

    pub async fn reopen_task(&self, params: TaskRefParams) -> CallToolResult {
        self.run("reopen-task", "reopening task", |auth| async move {
            self.api
                .patch_task(
                    &auth,
                    &params.task_list_id,
                    &params.task_id,
                    &TaskPatch::status(TaskStatus::NeedsAction),
                )
                .await?;
            Ok(text_success(format!(
                "Task with ID {} reopened successfully.",
                params.task_id
            )))
        })
        .await
    }
}

fn optional_due(raw: Option<&str>) -> ApiResult<Option<String>> {
    raw.map(str::trim)
        .filter(|d| !d.is_empty())
        .map(normalize_due)
        .transpose()
}

/// Normalize a due date to the RFC 3339 form the API stores
///
/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp and
/// renders `2025-01-31T00:00:00.000Z`.
pub fn normalize_due(raw: &str) -> ApiResult<String> {
    let invalid = || {
        ApiError::InvalidInput(format!(
            "invalid due date {raw:?} (expected YYYY-MM-DD or RFC 3339)"
        ))
    };

    let at = match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => {
            let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
            Utc.from_utc_datetime(&midnight)
        }
        Err(_) => DateTime::parse_from_rfc3339(raw)
            .map_err(|_| invalid())?
            .with_timezone(&Utc),
    };

    Ok(at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}
