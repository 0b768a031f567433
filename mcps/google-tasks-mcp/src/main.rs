//! Google Tasks MCP - task lists and tasks over stdio
//!
//! Authorization happens once before serving; a failure there exits
//! non-zero.

use clap::Parser;
use rmcp::{transport::io::stdio, ServiceExt};
use std::sync::Arc;

use google_tasks_mcp::auth::{
    Authorizer, BrowserPresenter, CredentialStore, LoopbackConsentFlow, OAuthTokenEndpoint,
};
use google_tasks_mcp::cli::Cli;
use google_tasks_mcp::tasks::GoogleTasksClient;
use google_tasks_mcp::GoogleTasksMcpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcp_common::init_tracing("google_tasks_mcp")?;

    let config = Cli::parse().into_config();
    tracing::info!(
        credentials = %config.credentials_path.display(),
        token = %config.token_path.display(),
        max_results = config.max_results,
        "Starting Google Tasks MCP server"
    );

    let http = reqwest::Client::new();
    let store = Arc::new(CredentialStore::new(
        &config.credentials_path,
        &config.token_path,
    ));
    let endpoint = Arc::new(OAuthTokenEndpoint::new(http.clone()));
    let consent = Arc::new(LoopbackConsentFlow::new(
        endpoint.clone(),
        Arc::new(BrowserPresenter {
            open_browser: config.open_browser,
        }),
    ));
    let authorizer = Arc::new(Authorizer::new(store, consent, endpoint));

    if let Err(e) = authorizer.authorize().await {
        tracing::error!("Startup authorization failed: {}", e);
        return Err(e.into());
    }
    tracing::info!("Authorized");

    let api = Arc::new(GoogleTasksClient::new(http, &config.api_base_url));
    let server = GoogleTasksMcpServer::new(&config, authorizer, api);
    let service = server.serve(stdio()).await?;

    tracing::info!("Google Tasks MCP server running");

    service.waiting().await?;

    tracing::info!("Google Tasks MCP server stopped");

    Ok(())
}
