//! Credential data model
//!
//! Two on-disk shapes are involved: the application's own OAuth client
//! registration (`credentials.json`, read-only) and the user grant persisted
//! after consent (`token.json`, `authorized_user` type).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const AUTHORIZED_USER_TYPE: &str = "authorized_user";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// The persisted, long-lived user grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "type", default = "authorized_user_type")]
    pub kind: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: String,
}

fn authorized_user_type() -> String {
    AUTHORIZED_USER_TYPE.to_string()
}

impl CredentialRecord {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            kind: authorized_user_type(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// A record can be used without consent only if every field is non-empty.
    pub fn is_usable(&self) -> bool {
        [&self.client_id, &self.client_secret, &self.refresh_token]
            .iter()
            .all(|v| !v.trim().is_empty())
    }

    /// Same client identity with a different refresh token
    pub fn with_refresh_token(&self, refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            ..self.clone()
        }
    }
}

/// Which console registration shape the credentials file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRegistration {
    Installed,
    Web,
}

/// Contents of one registration block in `credentials.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientSecretKey {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientSecretFile {
    #[serde(default)]
    pub installed: Option<ClientSecretKey>,
    #[serde(default)]
    pub web: Option<ClientSecretKey>,
}

/// The application's registered OAuth identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationCredentials {
    pub registration: AppRegistration,
    pub key: ClientSecretKey,
}

impl ApplicationCredentials {
    pub fn client_id(&self) -> &str {
        &self.key.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.key.client_secret
    }

    pub fn auth_uri(&self) -> &str {
        non_empty(self.key.auth_uri.as_deref()).unwrap_or(DEFAULT_AUTH_URI)
    }

    pub fn token_uri(&self) -> &str {
        non_empty(self.key.token_uri.as_deref()).unwrap_or(DEFAULT_TOKEN_URI)
    }

    pub fn redirect_uri(&self) -> &str {
        non_empty(self.key.redirect_uris.first().map(String::as_str))
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Token endpoint used for refresh when only a persisted record is present.
pub fn default_token_uri() -> &'static str {
    DEFAULT_TOKEN_URI
}

/// Short-lived bearer token held in memory only
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Whether the token can still be presented `lead` before expiry.
    /// Tokens without a known expiry are trusted until the API rejects them.
    pub fn is_fresh(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        match self.expires_at {
            Some(expiry) => expiry - lead > now,
            None => true,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
