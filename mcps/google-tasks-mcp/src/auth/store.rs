//! Durable storage for the single `authorized_user` record
//!
//! `load` treats every failure as "not authorized yet". `save` writes through
//! a sibling temp file and a rename so a concurrent reader sees either the old
//! or the new file, never a partial one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::types::{AppRegistration, ApplicationCredentials, ClientSecretFile, CredentialRecord};

#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl CredentialStore {
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Read the persisted record, if there is a parseable one
    ///
    /// Usability (non-empty fields) is the caller's decision.
    pub fn load(&self) -> Option<CredentialRecord> {
        let content = match fs::read_to_string(&self.token_path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(
                    path = %self.token_path.display(),
                    "No saved authorization: {}",
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<CredentialRecord>(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    path = %self.token_path.display(),
                    "Ignoring unreadable saved authorization: {}",
                    e
                );
                None
            }
        }
    }

    /// Read the application's client registration
    pub fn load_application_credentials(&self) -> Result<ApplicationCredentials, StoreError> {
        let path = &self.credentials_path;
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let file: ClientSecretFile =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;

        match (file.installed, file.web) {
            (Some(key), _) => Ok(ApplicationCredentials {
                registration: AppRegistration::Installed,
                key,
            }),
            (None, Some(key)) => Ok(ApplicationCredentials {
                registration: AppRegistration::Web,
                key,
            }),
            (None, None) => Err(StoreError::MissingApplicationCredentials(path.clone())),
        }
    }

    /// Persist a freshly granted refresh token
    ///
    /// The client identity is taken from the application credentials file so
    /// the saved record is self-describing. Returns the record as written.
    pub fn save(&self, refresh_token: &str) -> Result<CredentialRecord, StoreError> {
        let app = self.load_application_credentials()?;
        let record = CredentialRecord::new(app.client_id(), app.client_secret(), refresh_token);
        self.write_record(&record)?;
        Ok(record)
    }

    /// Persist a complete record as-is (used when the provider rotates the
    /// refresh token of an existing grant)
    pub fn write_record(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(record).map_err(|source| StoreError::Parse {
            path: self.token_path.clone(),
            source,
        })?;
        write_file_atomic(&self.token_path, &payload)?;
        tracing::info!(path = %self.token_path.display(), "Saved authorization");
        Ok(())
    }
}

fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| StoreError::Io { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let file_name = path
        .file_name()
        .and_then(|v| v.to_str())
        .unwrap_or("token.json");
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    let written = (|| -> std::io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::Io {
            path: tmp_path,
            source,
        });
    }

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}
