use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::transport::ApiError;

/// On-disk shape of the credential pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Shared access/refresh token pair with optional file persistence.
///
/// Clones share the same storage; the last write wins.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: Arc<RwLock<StoredTokens>>,
    last_rotated: Arc<RwLock<Option<DateTime<Utc>>>>,
    path: Option<Arc<PathBuf>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TokenStore {
    /// Empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory store seeded with a credential pair.
    pub fn with_tokens(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        let tokens = StoredTokens {
            access_token: non_empty(Some(access_token.into())),
            refresh_token: non_empty(refresh_token),
        };
        Self {
            tokens: Arc::new(RwLock::new(tokens)),
            last_rotated: Arc::new(RwLock::new(Some(Utc::now()))),
            path: None,
        }
    }

    /// Open a store backed by `path`. A missing file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ApiError> {
        let path = path.into();
        let tokens = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice::<StoredTokens>(&raw).map_err(|source| {
                ApiError::Json {
                    context: "session file",
                    source,
                }
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoredTokens::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), has_access = tokens.access_token.is_some(), "session file loaded");
        Ok(Self {
            tokens: Arc::new(RwLock::new(tokens)),
            last_rotated: Arc::new(RwLock::new(None)),
            path: Some(Arc::new(path)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.refresh_token.clone()
    }

    pub async fn has_access_token(&self) -> bool {
        self.tokens.read().await.access_token.is_some()
    }

    pub async fn snapshot(&self) -> StoredTokens {
        self.tokens.read().await.clone()
    }

    /// Store a new pair. A `None` refresh token keeps the current one.
    pub async fn set_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), ApiError> {
        let snapshot = {
            let mut tokens = self.tokens.write().await;
            let access_token = non_empty(Some(access_token));
            let changed = tokens.access_token != access_token;
            tokens.access_token = access_token;
            if let Some(refresh) = non_empty(refresh_token) {
                tokens.refresh_token = Some(refresh);
            }
            if changed {
                *self.last_rotated.write().await = Some(Utc::now());
            }
            tokens.clone()
        };
        self.persist(&snapshot).await
    }

    pub async fn set_access_token(&self, access_token: String) -> Result<(), ApiError> {
        self.set_tokens(access_token, None).await
    }

    /// Drop both tokens and remove the session file.
    pub async fn clear(&self) -> Result<(), ApiError> {
        let snapshot = {
            let mut tokens = self.tokens.write().await;
            *tokens = StoredTokens::default();
            tokens.clone()
        };
        *self.last_rotated.write().await = None;
        self.persist(&snapshot).await
    }

    pub async fn last_rotated(&self) -> Option<DateTime<Utc>> {
        *self.last_rotated.read().await
    }

    /// Seconds since the access token last changed in this process.
    pub async fn age_seconds(&self) -> u64 {
        match self.last_rotated().await {
            Some(rotated) => (Utc::now() - rotated).num_seconds().max(0) as u64,
            None => 0,
        }
    }

    async fn persist(&self, tokens: &StoredTokens) -> Result<(), ApiError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if tokens.is_empty() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            debug!(path = %path.display(), "session file removed");
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(tokens).map_err(|source| ApiError::Json {
            context: "session file",
            source,
        })?;
        tokio::fs::write(path, raw).await?;
        debug!(path = %path.display(), "session file written");
        Ok(())
    }
}
