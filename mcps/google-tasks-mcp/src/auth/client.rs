//! The in-memory handle handed to task operations
//!
//! Only the refresh token is durable. Access tokens are minted on demand,
//! cached with their expiry and refreshed shortly before they lapse, or after
//! the API rejects one (see [`AuthorizedClient::invalidate`]).

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::AuthResult;
use super::store::CredentialStore;
use super::token::{RefreshRequest, TokenEndpoint};
use super::types::{AccessToken, CredentialRecord};

/// Refresh this long before the provider-reported expiry
pub const REFRESH_LEAD_SECS: i64 = 60;

struct ClientState {
    record: CredentialRecord,
    access_token: Option<AccessToken>,
}

pub struct AuthorizedClient {
    token_uri: String,
    endpoint: Arc<dyn TokenEndpoint>,
    store: Arc<CredentialStore>,
    state: Mutex<ClientState>,
}

impl AuthorizedClient {
    pub fn new(
        record: CredentialRecord,
        token_uri: impl Into<String>,
        endpoint: Arc<dyn TokenEndpoint>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            token_uri: token_uri.into(),
            endpoint,
            store,
            state: Mutex::new(ClientState {
                record,
                access_token: None,
            }),
        }
    }

    /// Seed the cache with the access token minted during consent
    pub fn with_access_token(self, access_token: Option<AccessToken>) -> Self {
        let mut state = self.state.into_inner();
        state.access_token = access_token;
        Self {
            state: Mutex::new(state),
            ..self
        }
    }

    /// The current grant (reflects any rotation seen so far)
    pub async fn record(&self) -> CredentialRecord {
        self.state.lock().await.record.clone()
    }

    /// A bearer token valid for at least [`REFRESH_LEAD_SECS`]
    pub async fn access_token(&self) -> AuthResult<String> {
        let mut state = self.state.lock().await;

        if let Some(token) = &state.access_token {
            if token.is_fresh(Utc::now(), Duration::seconds(REFRESH_LEAD_SECS)) {
                return Ok(token.secret.clone());
            }
        }

        let tokens = self
            .endpoint
            .refresh(&RefreshRequest {
                token_uri: self.token_uri.clone(),
                client_id: state.record.client_id.clone(),
                client_secret: state.record.client_secret.clone(),
                refresh_token: state.record.refresh_token.clone(),
            })
            .await?;

        if let Some(rotated) = tokens
            .refresh_token
            .filter(|t| *t != state.record.refresh_token)
        {
            let record = state.record.with_refresh_token(rotated);
            match self.store.write_record(&record) {
                Ok(()) => tracing::info!("Persisted rotated refresh token"),
                Err(e) => tracing::warn!(
                    "Refresh token was rotated but could not be saved, the next start will need consent again: {}",
                    e
                ),
            }
            state.record = record;
        }

        tracing::debug!(expires_at = ?tokens.access_token.expires_at, "Minted access token");
        let secret = tokens.access_token.secret.clone();
        state.access_token = Some(tokens.access_token);
        Ok(secret)
    }

    /// Drop the cached access token so the next call refreshes
    pub async fn invalidate(&self) {
        self.state.lock().await.access_token = None;
    }
}

impl std::fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}
