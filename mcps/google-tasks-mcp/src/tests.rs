//! Cross-module tests: authorizer lifecycle and dispatcher contract

#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use rmcp::model::{CallToolResult, RawContent};
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    use crate::auth::token::{CodeExchangeRequest, RefreshRequest};
    use crate::auth::{
        AccessToken, ApplicationCredentials, AuthError, AuthResult, AuthorizedClient, Authorizer,
        ConsentFlow, ConsentGrant, CredentialRecord, CredentialStore, TokenEndpoint, TokenSet,
    };
    use crate::config::Config;
    use crate::handlers::Dispatcher;
    use crate::params::*;
    use crate::tasks::{ApiError, ApiResult, NewTask, Task, TaskList, TaskPatch, TasksApi};

    const INSTALLED: &str = r#"{"installed":{"client_id":"abc","client_secret":"xyz"}}"#;

    // ========================================================================
    // Fakes
    // ========================================================================

    /// Grants `r1` (or denies) and counts how often it was asked
    struct CountingConsent {
        calls: AtomicUsize,
        deny: bool,
    }

    impl CountingConsent {
        fn granting() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                deny: false,
            })
        }

        fn denying() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                deny: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConsentFlow for CountingConsent {
        async fn request_consent(
            &self,
            app: &ApplicationCredentials,
            scopes: &[&str],
        ) -> AuthResult<ConsentGrant> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(app.client_id(), "abc");
            assert_eq!(scopes, &["https://www.googleapis.com/auth/tasks"]);
            // Let concurrent callers pile up on the authorizer lock
            tokio::task::yield_now().await;

            if self.deny {
                return Err(AuthError::ConsentDenied);
            }
            Ok(ConsentGrant {
                refresh_token: "r1".into(),
                access_token: Some(AccessToken {
                    secret: "ya29.consent".into(),
                    expires_at: Some(Utc::now() + Duration::seconds(3600)),
                }),
            })
        }
    }

    /// Mints `ya29.<refresh_token>`; one refresh token can be marked revoked
    #[derive(Default)]
    struct FakeEndpoint {
        revoked: Option<String>,
    }

    #[async_trait]
    impl TokenEndpoint for FakeEndpoint {
        async fn exchange_code(&self, _req: &CodeExchangeRequest) -> AuthResult<TokenSet> {
            Err(AuthError::provider("not used"))
        }

        async fn refresh(&self, req: &RefreshRequest) -> AuthResult<TokenSet> {
            if self.revoked.as_deref() == Some(req.refresh_token.as_str()) {
                return Err(AuthError::GrantRevoked("Token has been expired or revoked.".into()));
            }
            Ok(TokenSet {
                access_token: AccessToken {
                    secret: format!("ya29.{}", req.refresh_token),
                    expires_at: Some(Utc::now() + Duration::seconds(3600)),
                },
                refresh_token: None,
            })
        }
    }

    /// In-memory Tasks API; every call first obtains a bearer token
    #[derive(Default)]
    struct FakeTasksApi {
        calls: AtomicUsize,
        tasks: Vec<Task>,
        /// When set, every call fails with this remote status
        failure: Option<(u16, &'static str)>,
        last_body: Mutex<Option<Value>>,
        last_max_results: Mutex<Option<u32>>,
    }

    impl FakeTasksApi {
        fn with_tasks(tasks: Vec<Task>) -> Arc<Self> {
            Arc::new(Self {
                tasks,
                ..Default::default()
            })
        }

        fn failing(status: u16, message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                failure: Some((status, message)),
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn touch(&self, auth: &AuthorizedClient) -> ApiResult<String> {
            let token = auth.access_token().await?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((status, message)) = self.failure {
                return Err(ApiError::Status {
                    status,
                    message: message.to_string(),
                });
            }
            Ok(token)
        }

        fn record_body<T: serde::Serialize>(&self, body: &T) {
            *self.last_body.lock().unwrap() = Some(serde_json::to_value(body).unwrap());
        }

        fn last_body(&self) -> Value {
            self.last_body.lock().unwrap().clone().unwrap()
        }
    }

    fn task(id: &str, title: &str, notes: Option<&str>) -> Task {
        Task {
            id: Some(id.into()),
            title: Some(title.into()),
            notes: notes.map(str::to_string),
            ..Default::default()
        }
    }

    #[async_trait]
    impl TasksApi for FakeTasksApi {
        async fn list_task_lists(
            &self,
            auth: &AuthorizedClient,
            max_results: u32,
        ) -> ApiResult<Vec<TaskList>> {
            let token = self.touch(auth).await?;
            *self.last_max_results.lock().unwrap() = Some(max_results);
            Ok(vec![TaskList {
                id: Some("L1".into()),
                title: Some(format!("token {token}")),
                ..Default::default()
            }])
        }

        async fn insert_task_list(
            &self,
            auth: &AuthorizedClient,
            title: &str,
        ) -> ApiResult<TaskList> {
            self.touch(auth).await?;
            Ok(TaskList {
                id: Some("L2".into()),
                title: Some(title.into()),
                ..Default::default()
            })
        }

        async fn patch_task_list(
            &self,
            auth: &AuthorizedClient,
            task_list_id: &str,
            title: &str,
        ) -> ApiResult<TaskList> {
            self.touch(auth).await?;
            Ok(TaskList {
                id: Some(task_list_id.into()),
                title: Some(title.into()),
                ..Default::default()
            })
        }

        async fn delete_task_list(
            &self,
            auth: &AuthorizedClient,
            _task_list_id: &str,
        ) -> ApiResult<()> {
            self.touch(auth).await?;
            Ok(())
        }

        async fn list_tasks(
            &self,
            auth: &AuthorizedClient,
            _task_list_id: &str,
            max_results: u32,
        ) -> ApiResult<Vec<Task>> {
            self.touch(auth).await?;
            *self.last_max_results.lock().unwrap() = Some(max_results);
            Ok(self.tasks.clone())
        }

        async fn insert_task(
            &self,
            auth: &AuthorizedClient,
            _task_list_id: &str,
            new_task: &NewTask,
        ) -> ApiResult<Task> {
            self.touch(auth).await?;
            self.record_body(new_task);
            Ok(Task {
                id: Some("T9".into()),
                title: Some(new_task.title.clone()),
                parent: new_task.parent.clone(),
                ..Default::default()
            })
        }

        async fn get_task(
            &self,
            auth: &AuthorizedClient,
            _task_list_id: &str,
            task_id: &str,
        ) -> ApiResult<Task> {
            self.touch(auth).await?;
            Ok(task(task_id, "Fetched", None))
        }

        async fn patch_task(
            &self,
            auth: &AuthorizedClient,
            _task_list_id: &str,
            task_id: &str,
            patch: &TaskPatch,
        ) -> ApiResult<Task> {
            self.touch(auth).await?;
            self.record_body(patch);
            Ok(task(task_id, patch.title.as_deref().unwrap_or("Patched"), None))
        }

        async fn delete_task(
            &self,
            auth: &AuthorizedClient,
            _task_list_id: &str,
            _task_id: &str,
        ) -> ApiResult<()> {
            self.touch(auth).await?;
            Ok(())
        }

        async fn clear_tasks(&self, auth: &AuthorizedClient, _task_list_id: &str) -> ApiResult<()> {
            self.touch(auth).await?;
            Ok(())
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn store(dir: &TempDir, credentials: Option<&str>) -> Arc<CredentialStore> {
        let credentials_path = dir.path().join("credentials.json");
        if let Some(content) = credentials {
            fs::write(&credentials_path, content).unwrap();
        }
        Arc::new(CredentialStore::new(
            credentials_path,
            dir.path().join("token.json"),
        ))
    }

    fn write_token(dir: &TempDir, record: &CredentialRecord) {
        fs::write(
            dir.path().join("token.json"),
            serde_json::to_string(record).unwrap(),
        )
        .unwrap();
    }

    fn authorizer(
        store: Arc<CredentialStore>,
        consent: Arc<CountingConsent>,
        endpoint: FakeEndpoint,
    ) -> Arc<Authorizer> {
        Arc::new(Authorizer::new(store, consent, Arc::new(endpoint)))
    }

    fn dispatcher(authorizer: Arc<Authorizer>, api: Arc<FakeTasksApi>) -> Dispatcher {
        let config = Config::for_install_dir(Path::new("/unused"));
        Dispatcher::new(&config, authorizer, api)
    }

    fn text_of(result: &CallToolResult) -> String {
        match &result.content[0].raw {
            RawContent::Text(t) => t.text.clone(),
            _ => panic!("expected text content"),
        }
    }

    fn is_error(result: &CallToolResult) -> bool {
        result.is_error.unwrap_or(false)
    }

    // ========================================================================
    // Authorizer
    // ========================================================================

    #[tokio::test]
    async fn test_valid_record_authorizes_without_prompt() {
        let dir = TempDir::new().unwrap();
        write_token(&dir, &CredentialRecord::new("abc", "xyz", "r0"));
        let consent = CountingConsent::granting();
        let auth = authorizer(store(&dir, Some(INSTALLED)), consent.clone(), FakeEndpoint::default());

        let client = auth.authorize().await.unwrap();

        assert_eq!(consent.calls(), 0);
        assert_eq!(client.record().await.refresh_token, "r0");
        assert_eq!(client.access_token().await.unwrap(), "ya29.r0");
    }

    #[tokio::test]
    async fn test_valid_record_without_credentials_file_still_works() {
        let dir = TempDir::new().unwrap();
        write_token(&dir, &CredentialRecord::new("abc", "xyz", "r0"));
        let consent = CountingConsent::granting();
        let auth = authorizer(store(&dir, None), consent.clone(), FakeEndpoint::default());

        let client = auth.authorize().await.unwrap();
        assert_eq!(client.access_token().await.unwrap(), "ya29.r0");
        assert_eq!(consent.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_record_runs_consent_once_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Some(INSTALLED));
        let consent = CountingConsent::granting();
        let auth = authorizer(store.clone(), consent.clone(), FakeEndpoint::default());

        let first = auth.authorize().await.unwrap();
        let second = auth.authorize().await.unwrap();

        assert_eq!(consent.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.load().unwrap().refresh_token, "r1");
        // The consent access token is reused instead of refreshing
        assert_eq!(first.access_token().await.unwrap(), "ya29.consent");
    }

    #[tokio::test]
    async fn test_first_run_writes_token_and_next_process_reuses_it() {
        let dir = TempDir::new().unwrap();
        let consent = CountingConsent::granting();
        authorizer(store(&dir, Some(INSTALLED)), consent.clone(), FakeEndpoint::default())
            .authorize()
            .await
            .unwrap();
        assert_eq!(consent.calls(), 1);

        let saved: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("token.json")).unwrap())
                .unwrap();
        assert_eq!(
            saved,
            json!({
                "type": "authorized_user",
                "client_id": "abc",
                "client_secret": "xyz",
                "refresh_token": "r1"
            })
        );

        // A fresh authorizer stands in for a restarted process
        let restarted_consent = CountingConsent::granting();
        let client = authorizer(
            store(&dir, Some(INSTALLED)),
            restarted_consent.clone(),
            FakeEndpoint::default(),
        )
        .authorize()
        .await
        .unwrap();

        assert_eq!(restarted_consent.calls(), 0);
        assert_eq!(client.access_token().await.unwrap(), "ya29.r1");
    }

    #[tokio::test]
    async fn test_incomplete_record_triggers_consent() {
        let dir = TempDir::new().unwrap();
        write_token(&dir, &CredentialRecord::new("abc", "xyz", ""));
        let store = store(&dir, Some(INSTALLED));
        let consent = CountingConsent::granting();
        let auth = authorizer(store.clone(), consent.clone(), FakeEndpoint::default());

        auth.authorize().await.unwrap();

        assert_eq!(consent.calls(), 1);
        assert_eq!(store.load().unwrap().refresh_token, "r1");
    }

    #[tokio::test]
    async fn test_corrupt_token_file_triggers_consent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("token.json"), "{not json").unwrap();
        let store = store(&dir, Some(INSTALLED));
        let consent = CountingConsent::granting();

        authorizer(store.clone(), consent.clone(), FakeEndpoint::default())
            .authorize()
            .await
            .unwrap();

        assert_eq!(consent.calls(), 1);
        assert_eq!(store.load().unwrap().refresh_token, "r1");
    }

    #[tokio::test]
    async fn test_save_failure_still_yields_working_client() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("credentials.json"), INSTALLED).unwrap();
        // A regular file where the token's parent directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let store = Arc::new(CredentialStore::new(
            dir.path().join("credentials.json"),
            blocker.join("token.json"),
        ));
        let consent = CountingConsent::granting();
        let auth = authorizer(store.clone(), consent.clone(), FakeEndpoint::default());
        let api = FakeTasksApi::with_tasks(vec![]);
        let dispatcher = dispatcher(auth, api.clone());

        let result = dispatcher.list_task_lists().await;

        assert!(!is_error(&result), "{}", text_of(&result));
        assert!(text_of(&result).contains("token ya29.consent"));
        assert_eq!(consent.calls(), 1);
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_denied_consent_writes_nothing_and_is_retried_later() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Some(INSTALLED));
        let consent = CountingConsent::denying();
        let auth = authorizer(store.clone(), consent.clone(), FakeEndpoint::default());

        let err = auth.authorize().await.unwrap_err();
        assert!(matches!(err, AuthError::ConsentDenied));
        assert!(!dir.path().join("token.json").exists());

        // Denied is terminal only for that attempt
        assert!(auth.authorize().await.is_err());
        assert_eq!(consent.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_authorize_prompts_once() {
        let dir = TempDir::new().unwrap();
        let consent = CountingConsent::granting();
        let auth = authorizer(store(&dir, Some(INSTALLED)), consent.clone(), FakeEndpoint::default());

        let (a, b) = tokio::join!(auth.authorize(), auth.authorize());

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(consent.calls(), 1);
    }

    #[tokio::test]
    async fn test_revoked_grant_is_replaced_by_new_consent() {
        let dir = TempDir::new().unwrap();
        write_token(&dir, &CredentialRecord::new("abc", "xyz", "r0"));
        let store = store(&dir, Some(INSTALLED));
        let consent = CountingConsent::granting();
        let endpoint = FakeEndpoint {
            revoked: Some("r0".into()),
        };
        let api = FakeTasksApi::with_tasks(vec![]);
        let dispatcher = dispatcher(
            authorizer(store.clone(), consent.clone(), endpoint),
            api.clone(),
        );

        let failed = dispatcher.list_task_lists().await;
        assert!(is_error(&failed));
        assert!(text_of(&failed).starts_with("Error listing task lists: stored authorization"));
        assert_eq!(consent.calls(), 0);

        let recovered = dispatcher.list_task_lists().await;
        assert!(!is_error(&recovered), "{}", text_of(&recovered));
        assert_eq!(consent.calls(), 1);
        assert_eq!(store.load().unwrap().refresh_token, "r1");
    }

    // ========================================================================
    // Dispatcher
    // ========================================================================

    fn ready_dispatcher(api: Arc<FakeTasksApi>) -> (TempDir, Dispatcher) {
        let dir = TempDir::new().unwrap();
        write_token(&dir, &CredentialRecord::new("abc", "xyz", "r0"));
        let auth = authorizer(
            store(&dir, Some(INSTALLED)),
            CountingConsent::granting(),
            FakeEndpoint::default(),
        );
        (dir, dispatcher(auth, api))
    }

    #[tokio::test]
    async fn test_auth_failure_is_error_result_without_remote_call() {
        let dir = TempDir::new().unwrap();
        // Neither token.json nor credentials.json
        let auth = authorizer(store(&dir, None), CountingConsent::granting(), FakeEndpoint::default());
        let api = FakeTasksApi::with_tasks(vec![]);
        let dispatcher = dispatcher(auth, api.clone());

        let result = dispatcher
            .list_tasks(TaskListIdParams {
                task_list_id: "L1".into(),
            })
            .await;

        assert!(is_error(&result));
        assert!(text_of(&result).starts_with("Error listing tasks: "));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_task_lists_uses_configured_page_size() {
        let api = FakeTasksApi::with_tasks(vec![]);
        let (_dir, dispatcher) = ready_dispatcher(api.clone());

        let result = dispatcher.list_task_lists().await;

        assert!(text_of(&result).starts_with("Task Lists:\n["));
        assert_eq!(*api.last_max_results.lock().unwrap(), Some(100));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_tasks_filters_title_and_notes() {
        let api = FakeTasksApi::with_tasks(vec![
            task("t1", "Buy milk", None),
            task("t2", "Call mom", Some("about the MILK delivery")),
            task("t3", "Write report", None),
        ]);
        let (_dir, dispatcher) = ready_dispatcher(api);

        let result = dispatcher
            .search_tasks(SearchTasksParams {
                task_list_id: "L1".into(),
                query: "milk".into(),
            })
            .await;

        let text = text_of(&result);
        let (label, body) = text.split_once('\n').unwrap();
        assert_eq!(label, "Search results for \"milk\":");
        let found: Vec<Task> = serde_json::from_str(body).unwrap();
        let ids: Vec<_> = found.iter().filter_map(|t| t.id.as_deref()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_create_task_defaults_and_normalizes() {
        let api = FakeTasksApi::with_tasks(vec![]);
        let (_dir, dispatcher) = ready_dispatcher(api.clone());

        let result = dispatcher
            .create_task(CreateTaskParams {
                task_list_id: "L1".into(),
                task_title: "Pay rent".into(),
                task_notes: None,
                task_due: Some("2025-01-31".into()),
                task_status: None,
                task_parent: Some("P1".into()),
            })
            .await;

        assert!(text_of(&result).starts_with("Task created successfully:\n"));
        assert_eq!(
            api.last_body(),
            json!({
                "title": "Pay rent",
                "due": "2025-01-31T00:00:00.000Z",
                "status": "needsAction"
            })
        );
        assert!(text_of(&result).contains("\"parent\": \"P1\""));
    }

    #[tokio::test]
    async fn test_create_task_rejects_unknown_status() {
        let api = FakeTasksApi::with_tasks(vec![]);
        let (_dir, dispatcher) = ready_dispatcher(api.clone());

        let result = dispatcher
            .create_task(CreateTaskParams {
                task_list_id: "L1".into(),
                task_title: "Pay rent".into(),
                task_notes: None,
                task_due: None,
                task_status: Some("done".into()),
                task_parent: None,
            })
            .await;

        assert!(is_error(&result));
        assert!(text_of(&result).starts_with("Error creating task: invalid task status"));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_task_rejects_bad_due_date() {
        let api = FakeTasksApi::with_tasks(vec![]);
        let (_dir, dispatcher) = ready_dispatcher(api.clone());

        let result = dispatcher
            .update_task(UpdateTaskParams {
                task_list_id: "L1".into(),
                task_id: "T1".into(),
                task_title: "Renamed".into(),
                task_notes: None,
                task_due: Some("31/01/2025".into()),
                task_parent: None,
            })
            .await;

        assert!(is_error(&result));
        assert!(text_of(&result).starts_with("Error updating task: invalid due date"));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_complete_and_reopen_patch_status() {
        let api = FakeTasksApi::with_tasks(vec![]);
        let (_dir, dispatcher) = ready_dispatcher(api.clone());
        let target = || TaskRefParams {
            task_list_id: "L1".into(),
            task_id: "T1".into(),
        };

        let done = dispatcher.complete_task(target()).await;
        assert_eq!(text_of(&done), "Task with ID T1 marked as completed.");
        assert_eq!(api.last_body(), json!({"status": "completed"}));

        let reopened = dispatcher.reopen_task(target()).await;
        assert_eq!(text_of(&reopened), "Task with ID T1 reopened successfully.");
        assert_eq!(api.last_body(), json!({"status": "needsAction"}));
    }

    #[tokio::test]
    async fn test_delete_and_clear_messages() {
        let api = FakeTasksApi::with_tasks(vec![]);
        let (_dir, dispatcher) = ready_dispatcher(api.clone());

        let deleted = dispatcher
            .delete_task(TaskRefParams {
                task_list_id: "L1".into(),
                task_id: "T1".into(),
            })
            .await;
        assert_eq!(
            text_of(&deleted),
            "Task with ID T1 deleted successfully from Task List ID L1."
        );

        let cleared = dispatcher
            .clear_tasks(TaskListIdParams {
                task_list_id: "L1".into(),
            })
            .await;
        assert_eq!(
            text_of(&cleared),
            "All tasks cleared successfully from Task List ID L1."
        );

        let dropped = dispatcher
            .delete_task_list(TaskListIdParams {
                task_list_id: "L1".into(),
            })
            .await;
        assert_eq!(text_of(&dropped), "Task List with ID L1 deleted successfully.");
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test]
    async fn test_remote_failure_carries_api_message() {
        let api = FakeTasksApi::failing(404, "Task not found.");
        let (_dir, dispatcher) = ready_dispatcher(api.clone());

        let result = dispatcher
            .get_task(TaskRefParams {
                task_list_id: "L1".into(),
                task_id: "missing".into(),
            })
            .await;

        assert!(is_error(&result));
        assert_eq!(text_of(&result), "Error retrieving task: Task not found.");
        assert_eq!(api.calls(), 1);

        // A remote failure leaves the authorization in place
        let again = dispatcher.list_task_lists().await;
        assert_eq!(text_of(&again), "Error listing task lists: Task not found.");
        assert_eq!(api.calls(), 2);
    }
}
