//! Google Tasks v1 over HTTPS
//!
//! See: https://developers.google.com/tasks/reference/rest

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::error::{ApiError, ApiResult};
use super::types::{NewTask, Page, Task, TaskList, TaskPatch};
use super::TasksApi;
use crate::auth::AuthorizedClient;

pub struct GoogleTasksClient {
    client: Client,
    base_url: String,
}

impl GoogleTasksClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidInput(format!("invalid API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidInput("API base URL is not hierarchical".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn lists_url(&self, rest: &[&str]) -> ApiResult<Url> {
        let mut segments = vec!["users", "@me", "lists"];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    fn tasks_url(&self, task_list_id: &str, rest: &[&str]) -> ApiResult<Url> {
        let mut segments = vec!["lists", task_list_id, "tasks"];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    /// Send one authorized request; a 401 invalidates the cached access token
    /// and the request is retried once with a fresh one.
    async fn execute(
        &self,
        auth: &AuthorizedClient,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> ApiResult<Option<String>> {
        let mut retried = false;
        loop {
            let token = auth.access_token().await?;

            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(token);
            if let Some(body) = &body {
                request = request.json(body);
            }

            tracing::debug!(%method, url = %url, "Calling Google Tasks");
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried {
                tracing::debug!("Access token rejected, refreshing and retrying once");
                auth.invalidate().await;
                retried = true;
                continue;
            }

            let text = response.text().await?;
            if !status.is_success() {
                return Err(status_error(status, &text));
            }
            return Ok(Some(text).filter(|t| !t.trim().is_empty()));
        }
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        auth: &AuthorizedClient,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let text = self
            .execute(auth, method, url, body)
            .await?
            .ok_or_else(|| ApiError::Decode("empty response body".into()))?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::InvalidInput(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Prefer the API's `error.message`, fall back to the status line
fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        });

    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl TasksApi for GoogleTasksClient {
    async fn list_task_lists(
        &self,
        auth: &AuthorizedClient,
        max_results: u32,
    ) -> ApiResult<Vec<TaskList>> {
        let mut url = self.lists_url(&[])?;
        url.query_pairs_mut()
            .append_pair("maxResults", &max_results.to_string());
        let page: Page<TaskList> = self.execute_json(auth, Method::GET, url, None).await?;
        Ok(page.items)
    }

    async fn insert_task_list(&self, auth: &AuthorizedClient, title: &str) -> ApiResult<TaskList> {
        let url = self.lists_url(&[])?;
        let body = serde_json::json!({ "title": title });
        self.execute_json(auth, Method::POST, url, Some(body)).await
    }

    async fn patch_task_list(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        title: &str,
    ) -> ApiResult<TaskList> {
        let url = self.lists_url(&[task_list_id])?;
        let body = serde_json::json!({ "title": title });
        self.execute_json(auth, Method::PATCH, url, Some(body)).await
    }

    async fn delete_task_list(&self, auth: &AuthorizedClient, task_list_id: &str) -> ApiResult<()> {
        let url = self.lists_url(&[task_list_id])?;
        self.execute(auth, Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn list_tasks(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        max_results: u32,
    ) -> ApiResult<Vec<Task>> {
        let mut url = self.tasks_url(task_list_id, &[])?;
        url.query_pairs_mut()
            .append_pair("maxResults", &max_results.to_string());
        let page: Page<Task> = self.execute_json(auth, Method::GET, url, None).await?;
        Ok(page.items)
    }

    async fn insert_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task: &NewTask,
    ) -> ApiResult<Task> {
        let mut url = self.tasks_url(task_list_id, &[])?;
        if let Some(parent) = task.parent.as_deref().filter(|p| !p.is_empty()) {
            url.query_pairs_mut().append_pair("parent", parent);
        }
        self.execute_json(auth, Method::POST, url, Some(to_body(task)?))
            .await
    }

    async fn get_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task_id: &str,
    ) -> ApiResult<Task> {
        let url = self.tasks_url(task_list_id, &[task_id])?;
        self.execute_json(auth, Method::GET, url, None).await
    }

    async fn patch_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> ApiResult<Task> {
        let url = self.tasks_url(task_list_id, &[task_id])?;
        self.execute_json(auth, Method::PATCH, url, Some(to_body(patch)?))
            .await
    }

    async fn delete_task(
        &self,
        auth: &AuthorizedClient,
        task_list_id: &str,
        task_id: &str,
    ) -> ApiResult<()> {
        let url = self.tasks_url(task_list_id, &[task_id])?;
        self.execute(auth, Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn clear_tasks(&self, auth: &AuthorizedClient, task_list_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["lists", task_list_id, "clear"])?;
        self.execute(auth, Method::POST, url, None).await?;
        Ok(())
    }
}
