//! Interactive user consent
//!
//! [`LoopbackConsentFlow`] is the installed-app flow: listen on a loopback
//! redirect, send the user to the provider's consent page, receive the
//! authorization code on the redirect and exchange it (with PKCE) for tokens.

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use super::callback::CallbackListener;
use super::error::{AuthError, AuthResult};
use super::pkce::{random_state, PkcePair};
use super::token::{CodeExchangeRequest, TokenEndpoint};
use super::types::{AccessToken, ApplicationCredentials};

/// Result of a granted consent
#[derive(Debug, Clone)]
pub struct ConsentGrant {
    pub refresh_token: String,
    pub access_token: Option<AccessToken>,
}

/// Obtains a new user grant, blocking until the user answers
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn request_consent(
        &self,
        app: &ApplicationCredentials,
        scopes: &[&str],
    ) -> AuthResult<ConsentGrant>;
}

/// Shows the consent URL to the user
pub trait ConsentPresenter: Send + Sync {
    fn present(&self, authorization_url: &Url);
}

/// Logs the URL to stderr and optionally opens the system browser
#[derive(Debug, Clone)]
pub struct BrowserPresenter {
    pub open_browser: bool,
}

impl ConsentPresenter for BrowserPresenter {
    fn present(&self, authorization_url: &Url) {
        tracing::info!(
            "Authorize this app by visiting: {}",
            authorization_url.as_str()
        );
        if self.open_browser {
            if let Err(e) = open::that(authorization_url.as_str()) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }
    }
}

pub struct LoopbackConsentFlow {
    endpoint: Arc<dyn TokenEndpoint>,
    presenter: Arc<dyn ConsentPresenter>,
}

impl LoopbackConsentFlow {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>, presenter: Arc<dyn ConsentPresenter>) -> Self {
        Self {
            endpoint,
            presenter,
        }
    }
}

pub(crate) fn authorization_url(
    app: &ApplicationCredentials,
    scopes: &[&str],
    redirect_uri: &Url,
    state: &str,
    code_challenge: &str,
) -> AuthResult<Url> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        app.auth_uri(),
        &[
            ("client_id", app.client_id()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| AuthError::Configuration(format!("invalid auth_uri {:?}: {e}", app.auth_uri())))
}

#[async_trait]
impl ConsentFlow for LoopbackConsentFlow {
    async fn request_consent(
        &self,
        app: &ApplicationCredentials,
        scopes: &[&str],
    ) -> AuthResult<ConsentGrant> {
        let listener = CallbackListener::bind(app.redirect_uri()).await?;
        let redirect_uri = listener.redirect_uri().clone();

        let state = random_state();
        let pkce = PkcePair::generate();
        let url = authorization_url(app, scopes, &redirect_uri, &state, &pkce.code_challenge)?;

        tracing::info!(redirect_uri = %redirect_uri, "Waiting for user consent");
        self.presenter.present(&url);

        let payload = listener.wait_for_callback(&state).await?;

        if let Some(error) = payload.error {
            return Err(if error == "access_denied" {
                AuthError::ConsentDenied
            } else {
                let detail = payload
                    .error_description
                    .map(|d| format!("{error}: {d}"))
                    .unwrap_or(error);
                AuthError::provider(format!("consent failed: {detail}"))
            });
        }

        let code = payload
            .code
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AuthError::provider("OAuth redirect carried no authorization code"))?;

        let tokens = self
            .endpoint
            .exchange_code(&CodeExchangeRequest {
                token_uri: app.token_uri().to_string(),
                client_id: app.client_id().to_string(),
                client_secret: app.client_secret().to_string(),
                code,
                redirect_uri: redirect_uri.to_string(),
                code_verifier: pkce.code_verifier,
            })
            .await?;

        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            AuthError::provider("consent provider did not return a refresh token")
        })?;

        tracing::info!("User consent granted");
        Ok(ConsentGrant {
            refresh_token,
            access_token: Some(tokens.access_token),
        })
    }
}
