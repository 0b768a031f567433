//! Google Tasks API access
//!
//! [`TasksApi`] is the seam between the tool handlers and the remote service;
//! [`google::GoogleTasksClient`] is the HTTPS implementation.

use async_trait::async_trait;

use crate::auth::AuthorizedClient;

pub mod error;
pub mod google;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use google::GoogleTasksClient;
pub use types::{NewTask, Task, TaskList, TaskPatch, TaskStatus};

/// One method per remote endpoint; every call is a single request
#[async_trait]
pub trait TasksApi: Send + Sync {
    async fn list_task_lists(
        &self,
        auth: &AuthorizedClient,
        max_results: u32,
    ) -> ApiResult<Vec<TaskList>>;

    async fn insert_task_list(&self, auth: &AuthorizedClient, title: &str) -> ApiResult<TaskList>;

    async fn patch_task_list(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        title: &str,
    ) -> ApiResult<TaskList>;

    async fn delete_task_list(&self, auth: &AuthorizedClient, task_list_id: &str) -> ApiResult<()>;

    async fn list_tasks(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        max_results: u32,
    ) -> ApiResult<Vec<Task>>;

    async fn insert_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task: &NewTask,
    ) -> ApiResult<Task>;

    async fn get_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task_id: &str,
    ) -> ApiResult<Task>;

    async fn patch_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> ApiResult<Task>;

    async fn delete_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task_id: &str,
    ) -> ApiResult<()>;

    /// Remove all completed tasks from a list
    async fn clear_tasks(&self, auth: &AuthorizedClient, task_list_id: &str) -> ApiResult<()>;
}
