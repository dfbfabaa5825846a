//! Session context
//!
//! The bearer token and base URL are resolved once, wrapped in a
//! [`Session`], and handed to the [`ApiClient`](super::ApiClient). Nothing
//! downstream reads the token file or the environment again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{ClientError, ClientResult};
use crate::config::Config;

/// Request context shared by every API call of one session
#[derive(Clone)]
pub struct Session {
    base_url: String,
    token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Session {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Build a session from config: explicit token first, then the token file
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let token = match &config.auth.token {
            Some(token) => token.clone(),
            None => TokenStore::new(&config.auth.token_file)
                .load()?
                .map(|stored| stored.access_token)
                .ok_or(ClientError::MissingAuthToken)?,
        };

        if token.trim().is_empty() {
            return Err(ClientError::MissingAuthToken);
        }

        Ok(Self::new(config.api.base_url.clone(), token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/leads/count?sent=false`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Token persisted by `leadboard login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub token_type: String,
    pub saved_at: DateTime<Utc>,
}

/// File-backed token storage
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token, `None` when nobody has logged in
    pub fn load(&self) -> ClientResult<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let token: StoredToken = serde_json::from_str(&content)?;
        Ok(Some(token))
    }

    pub fn save(&self, access_token: &str, token_type: &str) -> ClientResult<StoredToken> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let token = StoredToken {
            access_token: access_token.to_string(),
            token_type: token_type.to_string(),
            saved_at: Utc::now(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&token)?)?;

        tracing::debug!(path = ?self.path, "Stored access token");
        Ok(token)
    }

    /// Remove the stored token; returns whether one existed
    pub fn clear(&self) -> ClientResult<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
