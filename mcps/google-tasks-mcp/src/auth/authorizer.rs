//! Produces a ready [`AuthorizedClient`] for every operation
//!
//! Per process: `Unauthenticated -> Ready` either from the saved record (no
//! prompt) or through interactive consent. `Ready` is sticky; later calls
//! return the same client. A failed consent leaves the state untouched, so
//! the next call simply tries again.

use std::sync::Arc;
use tokio::sync::Mutex;

use super::client::AuthorizedClient;
use super::consent::ConsentFlow;
use super::error::{AuthError, AuthResult};
use super::store::CredentialStore;
use super::token::TokenEndpoint;
use super::types::{default_token_uri, CredentialRecord};
use crate::config::TASKS_SCOPE;

#[derive(Default)]
struct AuthorizerState {
    client: Option<Arc<AuthorizedClient>>,
    /// Refresh token the provider reported as revoked in this process
    revoked_refresh_token: Option<String>,
}

pub struct Authorizer {
    store: Arc<CredentialStore>,
    consent: Arc<dyn ConsentFlow>,
    endpoint: Arc<dyn TokenEndpoint>,
    state: Mutex<AuthorizerState>,
}

impl Authorizer {
    pub fn new(
        store: Arc<CredentialStore>,
        consent: Arc<dyn ConsentFlow>,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            store,
            consent,
            endpoint,
            state: Mutex::new(AuthorizerState::default()),
        }
    }

    /// Return a usable client, running consent only when nothing usable is stored
    ///
    /// The lock is held across consent so concurrent callers wait for the one
    /// prompt instead of opening their own.
    pub async fn authorize(&self) -> AuthResult<Arc<AuthorizedClient>> {
        let mut state = self.state.lock().await;

        if let Some(client) = &state.client {
            return Ok(client.clone());
        }

        if let Some(record) = self.store.load() {
            let revoked =
                state.revoked_refresh_token.as_deref() == Some(record.refresh_token.as_str());
            if record.is_usable() && !revoked {
                tracing::debug!("Using saved authorization");
                let client = Arc::new(self.client_for(record));
                state.client = Some(client.clone());
                return Ok(client);
            }
            tracing::info!("Saved authorization is unusable, requesting consent");
        }

        let client = Arc::new(self.run_consent().await?);
        state.client = Some(client.clone());
        Ok(client)
    }

    /// React to an error raised while using a client from [`Self::authorize`]
    ///
    /// A revoked grant drops the cached client and marks the saved refresh
    /// token unusable so the next `authorize()` asks for consent again.
    pub async fn report_failure(&self, error: &AuthError) {
        if let AuthError::GrantRevoked(reason) = error {
            let mut state = self.state.lock().await;
            if let Some(client) = state.client.take() {
                let record = client.record().await;
                state.revoked_refresh_token = Some(record.refresh_token);
            }
            tracing::warn!(
                "Saved authorization was revoked ({}); consent will be requested again",
                reason
            );
        }
    }

    async fn run_consent(&self) -> AuthResult<AuthorizedClient> {
        let app = self.store.load_application_credentials()?;

        let grant = self.consent.request_consent(&app, &[TASKS_SCOPE]).await?;

        let record = match self.store.save(&grant.refresh_token) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    "Authorization granted but could not be saved, the next start will ask again: {}",
                    e
                );
                CredentialRecord::new(app.client_id(), app.client_secret(), &grant.refresh_token)
            }
        };

        let client = AuthorizedClient::new(
            record,
            app.token_uri(),
            self.endpoint.clone(),
            self.store.clone(),
        )
        .with_access_token(grant.access_token);
        Ok(client)
    }

    fn client_for(&self, record: CredentialRecord) -> AuthorizedClient {
        // The saved record does not carry a token_uri; refresh against the
        // registration's endpoint when available.
        let token_uri = self
            .store
            .load_application_credentials()
            .map(|app| app.token_uri().to_string())
            .unwrap_or_else(|_| default_token_uri().to_string());

        AuthorizedClient::new(record, token_uri, self.endpoint.clone(), self.store.clone())
    }
}
