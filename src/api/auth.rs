//! Bearer-token lifecycle: storage, login, verification, logout
//!
//! At most one token is active per `TokenStore`. Clones share the same slot,
//! so a login through one handle is seen by every request issued afterwards.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use directories::ProjectDirs;
use reqwest::Method;
use serde_json::json;
use thiserror::Error;

use super::{decode, parse_body, ApiClient, ApiError, CostClass};
use crate::data::{LoginResponse, TokenVerification};

/// Errors that can occur when persisting the bearer token
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Failed to access token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Process-wide holder of the bearer token, optionally persisted to disk
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<String>>>,
    path: Option<PathBuf>,
}

impl TokenStore {
    /// A store that forgets the token when the process exits
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// An in-memory store that starts with `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
            path: None,
        }
    }

    /// A store persisted at `path`, loading any token already saved there
    ///
    /// A missing file means no token; a blank file is treated the same.
    pub fn file_backed(path: PathBuf) -> Result<Self, TokenStoreError> {
        let token = match fs::read_to_string(&path) {
            Ok(content) => Some(content.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(TokenStoreError::Io { path, source }),
        };

        Ok(Self {
            token: Arc::new(RwLock::new(token)),
            path: Some(path),
        })
    }

    /// XDG-compliant token location (`~/.config/churnctl/token` on Linux)
    ///
    /// Returns `None` if no home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "churnctl")?;
        Some(project_dirs.config_dir().join("token"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The active token, if any
    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the active token and persists it when file-backed
    pub fn set(&self, token: impl Into<String>) -> Result<(), TokenStoreError> {
        let token = token.into();

        if let Some(path) = &self.path {
            let io_err = |source| TokenStoreError::Io {
                path: path.clone(),
                source,
            };
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            write_private(path, &token).map_err(io_err)?;
        }

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }

    /// Forgets the token, removing the persisted copy
    pub fn clear(&self) -> Result<(), TokenStoreError> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;

        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(TokenStoreError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }
}

/// Writes `contents` to `path`, readable by the owner only on unix
fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    // The mode above only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(contents.as_bytes())
}

impl ApiClient {
    /// Exchanges credentials for a token and makes it the active one
    ///
    /// Sent without an Authorization header, exactly once.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .request(Method::POST, "/auth/login", CostClass::Standard)
            .with_body(json!({ "username": username, "password": password }));

        let body = self.send_unauthenticated(request).await?;
        let login: LoginResponse = decode(parse_body(&body)?)?;

        self.tokens.set(login.token.clone())?;
        tracing::info!(username = %login.user.username, role = %login.user.role, "logged in");
        Ok(login)
    }

    /// Asks the server whether the active token is still good
    ///
    /// A rejected token surfaces as `ApiError::Auth`; it is not logged as a warning.
    pub async fn verify_token(&self) -> Result<TokenVerification, ApiError> {
        let request = self.request(Method::GET, "/auth/verify-token", CostClass::Standard);
        decode(self.send_json(request).await?)
    }

    /// Forgets the token and every cached response fetched with it
    pub fn logout(&self) -> Result<(), ApiError> {
        self.tokens.clear()?;
        self.clear_cache(None);
        Ok(())
    }
}
