//! OAuth token endpoint (authorization_code + refresh_token grants)

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::error::{AuthError, AuthResult};
use super::types::AccessToken;

#[derive(Debug, Clone)]
pub struct CodeExchangeRequest {
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub code: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Tokens minted by a successful grant
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: AccessToken,
    /// Present on code exchange, and on refresh when the provider rotates it
    pub refresh_token: Option<String>,
}

/// Something that can exchange grants for tokens
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, req: &CodeExchangeRequest) -> AuthResult<TokenSet>;

    async fn refresh(&self, req: &RefreshRequest) -> AuthResult<TokenSet>;
}

/// Token endpoint over HTTPS
#[derive(Debug, Clone)]
pub struct OAuthTokenEndpoint {
    client: reqwest::Client,
}

impl OAuthTokenEndpoint {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post_form(&self, token_uri: &str, form: &[(&str, &str)]) -> AuthResult<TokenSet> {
        let response = self
            .client
            .post(token_uri.trim())
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::provider(format!("token request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::provider(format!("token response read failed: {e}")))?;

        parse_token_response(status, &body, Utc::now())
    }
}

#[async_trait]
impl TokenEndpoint for OAuthTokenEndpoint {
    async fn exchange_code(&self, req: &CodeExchangeRequest) -> AuthResult<TokenSet> {
        tracing::debug!("Exchanging authorization code");
        self.post_form(
            &req.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", req.code.trim()),
                ("redirect_uri", req.redirect_uri.trim()),
                ("client_id", req.client_id.trim()),
                ("client_secret", req.client_secret.trim()),
                ("code_verifier", req.code_verifier.trim()),
            ],
        )
        .await
    }

    async fn refresh(&self, req: &RefreshRequest) -> AuthResult<TokenSet> {
        tracing::debug!("Refreshing access token");
        self.post_form(
            &req.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", req.refresh_token.trim()),
                ("client_id", req.client_id.trim()),
                ("client_secret", req.client_secret.trim()),
            ],
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub(crate) fn parse_token_response(
    status: u16,
    body: &str,
    now: DateTime<Utc>,
) -> AuthResult<TokenSet> {
    if !(200..300).contains(&status) {
        return Err(match serde_json::from_str::<TokenErrorResponse>(body) {
            Ok(err) => {
                let detail = match err.error_description {
                    Some(desc) if !desc.trim().is_empty() => format!("{}: {}", err.error, desc),
                    _ => err.error.clone(),
                };
                if err.error == "invalid_grant" {
                    AuthError::GrantRevoked(detail)
                } else {
                    AuthError::provider(format!("token endpoint returned {status}: {detail}"))
                }
            }
            Err(_) => AuthError::provider(format!("token endpoint returned {status}")),
        });
    }

    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AuthError::provider(format!("token response is not valid JSON: {e}")))?;

    if parsed.access_token.trim().is_empty() {
        return Err(AuthError::provider("token response missing access_token"));
    }

    // Out-of-range lifetimes are treated as unknown expiry
    let expires_at = parsed
        .expires_in
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime));

    Ok(TokenSet {
        access_token: AccessToken {
            secret: parsed.access_token,
            expires_at,
        },
        refresh_token: parsed
            .refresh_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
    })
}
