//! Delegated authorization for the Google Tasks API
//!
//! - [`store`]: the persisted `authorized_user` record and the app registration
//! - [`authorizer`]: reuse the saved grant or run consent, once per process
//! - [`client`]: access-token cache and refresh on top of a grant
//! - [`consent`]: interactive loopback consent (browser redirect + PKCE)

pub mod authorizer;
pub mod callback;
pub mod client;
pub mod consent;
pub mod error;
pub mod pkce;
pub mod store;
pub mod token;
pub mod types;

pub use authorizer::Authorizer;
pub use client::AuthorizedClient;
pub use consent::{BrowserPresenter, ConsentFlow, ConsentGrant, LoopbackConsentFlow};
pub use error::{AuthError, AuthResult, StoreError};
pub use store::CredentialStore;
pub use token::{OAuthTokenEndpoint, TokenEndpoint, TokenSet};
pub use types::{AccessToken, AppRegistration, ApplicationCredentials, CredentialRecord};
