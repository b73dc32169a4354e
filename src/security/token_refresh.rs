use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::models::TokenGrant;
use crate::transport::ApiError;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchanges a refresh token for a new access token.
///
/// Uses a plain `reqwest` call so a failing refresh never re-enters the
/// gateway's 401 handling.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    refresh_url: String,
    http: Client,
}

impl TokenRefresher {
    pub fn new(primary_base_url: &str, http: Client) -> Self {
        Self {
            refresh_url: format!("{}/auth/refresh", primary_base_url.trim_end_matches('/')),
            http,
        }
    }

    pub fn refresh_url(&self) -> &str {
        &self.refresh_url
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ApiError> {
        debug!(url = %self.refresh_url, "exchanging refresh token");

        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        let body = response.bytes().await?;
        let grant: TokenGrant = serde_json::from_slice(&body).map_err(|source| ApiError::Json {
            context: "refresh response",
            source,
        })?;
        if grant.access_token.trim().is_empty() {
            return Err(ApiError::validation("refresh response carried an empty access token"));
        }
        Ok(grant)
    }
}
