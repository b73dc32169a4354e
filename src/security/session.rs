use std::sync::Arc;

use reqwest::Url;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{TokenGrant, UserProfile};
use crate::security::audit_log::SessionAudit;
use crate::security::token_store::TokenStore;
use crate::transport::ApiError;

/// Process-wide session: the stored credentials plus the signed-in profile.
///
/// Authentication is derived from the token store, so the flag can never
/// disagree with the presence of an access token.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tokens: TokenStore,
    user: Arc<RwLock<Option<UserProfile>>>,
    audit: SessionAudit,
}

impl SessionStore {
    pub fn new(tokens: TokenStore) -> Self {
        Self {
            tokens,
            user: Arc::new(RwLock::new(None)),
            audit: SessionAudit::new(),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Store the credentials from a login or signup response.
    pub async fn establish(
        &self,
        grant: TokenGrant,
        method: &str,
    ) -> Result<Option<UserProfile>, ApiError> {
        self.tokens
            .set_tokens(grant.access_token, grant.refresh_token)
            .await?;
        *self.user.write().await = grant.user.clone();
        self.audit
            .login(grant.user.as_ref().map(|u| u.id.as_str()), method);
        Ok(grant.user)
    }

    /// Store the credentials carried by an OAuth redirect.
    ///
    /// Accepts a full callback URL or just its query string. The access token
    /// may arrive as `access_token` or `token`; an `error` parameter aborts.
    pub async fn establish_from_callback(&self, callback: &str) -> Result<(), ApiError> {
        let params = CallbackParams::parse(callback)?;
        if let Some(error) = params.error {
            return Err(ApiError::validation(format!("oauth login failed: {error}")));
        }
        match params.access_token {
            Some(access) => {
                self.tokens.set_tokens(access, params.refresh_token).await?;
                debug!("oauth callback tokens stored");
            }
            // The backend may have set the session cookie itself; `/me` decides.
            None => debug!("oauth callback carried no tokens"),
        }
        self.audit.login(None, "oauth");
        Ok(())
    }

    pub async fn set_user(&self, user: UserProfile) {
        *self.user.write().await = Some(user);
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.user.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.has_access_token().await
    }

    /// Drop a dangling profile when the credentials are gone.
    pub async fn check_auth(&self) -> bool {
        let authenticated = self.is_authenticated().await;
        if !authenticated {
            *self.user.write().await = None;
        }
        authenticated
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let previous = self.user.write().await.take();
        self.tokens.clear().await?;
        self.audit.logout(previous.as_ref().map(|u| u.id.as_str()));
        info!("session cleared");
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn parse(callback: &str) -> Result<Self, ApiError> {
        let trimmed = callback.trim();
        let url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(_) => {
                let query = trimmed.trim_start_matches('?');
                let base = Url::parse("http://localhost/auth/callback")
                    .map_err(|e| ApiError::validation(e.to_string()))?;
                base.join(&format!("?{query}"))
                    .map_err(|e| ApiError::validation(format!("bad callback: {e}")))?
            }
        };

        let mut params = CallbackParams::default();
        let mut fallback_token = None;
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "access_token" => params.access_token = Some(value),
                "token" => fallback_token = Some(value),
                "refresh_token" => params.refresh_token = Some(value),
                "error" => params.error = Some(value),
                _ => {}
            }
        }
        if params.access_token.is_none() {
            params.access_token = fallback_token;
        }
        Ok(params)
    }
}
