use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::cache::QueryCache;
use crate::models::TokenGrant;
use crate::security::audit_log::SessionAudit;
use crate::security::token_refresh::TokenRefresher;
use crate::security::token_store::TokenStore;
use crate::transport::{bearer, ApiError, ApiRequest, RequestBody, UploadFile};

/// HTTP client for one backend that attaches the stored bearer token and
/// recovers once from an expired access token.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    http: Client,
    tokens: TokenStore,
    refresher: TokenRefresher,
    audit: SessionAudit,
    cache: Option<QueryCache>,
}

impl GatewayClient {
    pub fn new(
        base_url: &str,
        http: Client,
        tokens: TokenStore,
        refresher: TokenRefresher,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            tokens,
            refresher,
            audit: SessionAudit::new(),
            cache: None,
        }
    }

    /// Cache to empty when the session ends on an unrecoverable 401.
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Send a request, refreshing the session at most once on a 401.
    ///
    /// Non-success statuses come back as [`ApiError::Status`]; when the
    /// refresh cannot recover the session the original 401 is returned and
    /// both stored tokens are gone.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        self.intercept_request(&mut request).await;
        let response = self.dispatch(&request).await?;

        if response.status() != StatusCode::UNAUTHORIZED || request.retried {
            return Self::check_status(response).await;
        }

        request.retried = true;
        let original = ApiError::from_response(response).await;
        debug!(
            request_id = %request.request_id,
            path = %request.path,
            "access token rejected, attempting refresh"
        );

        let Some(grant) = self.refresh_session(&request.request_id).await else {
            return Err(original);
        };

        request.authorization = Some(bearer(&grant.access_token));
        let response = self.dispatch(&request).await?;
        Self::check_status(response).await
    }

    /// Send and decode a JSON body.
    pub async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Json {
            context: "response body",
            source,
        })
    }

    /// Send and discard whatever body comes back.
    pub async fn execute(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    async fn intercept_request(&self, request: &mut ApiRequest) {
        if request.authorization.is_some() {
            return;
        }
        if let Some(token) = self.tokens.access_token().await {
            request.authorization = Some(bearer(&token));
        }
    }

    async fn refresh_session(&self, request_id: &str) -> Option<TokenGrant> {
        let Some(refresh_token) = self.tokens.refresh_token().await else {
            self.audit.refresh_skipped(request_id, "no refresh token stored");
            self.discard_tokens().await;
            return None;
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(grant) => {
                let rotated = grant.refresh_token.is_some();
                if let Err(err) = self
                    .tokens
                    .set_tokens(grant.access_token.clone(), grant.refresh_token.clone())
                    .await
                {
                    self.audit.storage_failed("persist refreshed tokens", &err.to_string());
                }
                self.audit.token_refreshed(request_id, rotated);
                Some(grant)
            }
            Err(err) => {
                warn!(request_id, error = %err, "token refresh failed, clearing session");
                self.audit.refresh_failed(request_id, &err.to_string());
                self.discard_tokens().await;
                None
            }
        }
    }

    /// End the session: both tokens and everything read with them go.
    async fn discard_tokens(&self) {
        if let Err(err) = self.tokens.clear().await {
            self.audit.storage_failed("clear tokens", &err.to_string());
        }
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header("X-Request-Id", &request.request_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(auth) = &request.authorization {
            builder = builder.header(AUTHORIZATION, HeaderValue::from_str(auth)?);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart { field, files } => builder.multipart(build_form(field, files)?),
        };

        trace!(
            request_id = %request.request_id,
            method = %request.method,
            url = %url,
            retried = request.retried,
            authenticated = request.authorization.is_some(),
            "dispatching request"
        );

        let response = builder.send().await?;
        debug!(
            request_id = %request.request_id,
            status = response.status().as_u16(),
            url = %url,
            "response received"
        );
        Ok(response)
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response).await)
        }
    }
}

fn build_form(field: &str, files: &[UploadFile]) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for file in files {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)?;
        form = form.part(field.to_string(), part);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryKey;
    use mockito::{Matcher, Server, ServerGuard};

    async fn gateway(server: &ServerGuard, tokens: TokenStore) -> GatewayClient {
        let http = Client::new();
        let refresher = TokenRefresher::new(&server.url(), http.clone());
        GatewayClient::new(&server.url(), http, tokens, refresher)
    }

    #[tokio::test]
    async fn attaches_stored_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer token-abc")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = gateway(&server, TokenStore::with_tokens("token-abc", None)).await;
        let body: serde_json::Value = client.json(ApiRequest::get("/me")).await.unwrap();
        assert_eq!(body["ok"], true);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn no_header_without_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ideas")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;

        let client = gateway(&server, TokenStore::new()).await;
        client.execute(ApiRequest::get("/ideas")).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_refreshes_once_and_retries() {
        let mut server = Server::new_async().await;
        let stale = server
            .mock("GET", "/ideas/42")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .with_body(r#"{"detail":"token expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(serde_json::json!({"refresh_token": "r-1"})))
            .with_status(200)
            .with_body(r#"{"access_token":"fresh"}"#)
            .expect(1)
            .create_async()
            .await;
        let fresh = server
            .mock("GET", "/ideas/42")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body(r#"{"id":"42"}"#)
            .expect(1)
            .create_async()
            .await;

        let tokens = TokenStore::with_tokens("stale", Some("r-1".into()));
        let client = gateway(&server, tokens.clone()).await;
        let body: serde_json::Value = client.json(ApiRequest::get("/ideas/42")).await.unwrap();

        assert_eq!(body["id"], "42");
        assert_eq!(tokens.access_token().await.as_deref(), Some("fresh"));
        assert_eq!(tokens.refresh_token().await.as_deref(), Some("r-1"));
        stale.assert_async().await;
        refresh.assert_async().await;
        fresh.assert_async().await;
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_stored() {
        let mut server = Server::new_async().await;
        let _stale = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","refresh_token":"r-2"}"#)
            .create_async()
            .await;
        let _fresh = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let tokens = TokenStore::with_tokens("stale", Some("r-1".into()));
        let client = gateway(&server, tokens.clone()).await;
        client.execute(ApiRequest::get("/me")).await.unwrap();
        assert_eq!(tokens.refresh_token().await.as_deref(), Some("r-2"));
    }

    #[tokio::test]
    async fn second_unauthorized_propagates_without_another_refresh() {
        let mut server = Server::new_async().await;
        let _stale = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh"}"#)
            .expect(1)
            .create_async()
            .await;
        let still_rejected = server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer fresh")
            .with_status(401)
            .with_body(r#"{"detail":"account disabled"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = gateway(&server, TokenStore::with_tokens("stale", Some("r".into()))).await;
        let err = client.execute(ApiRequest::get("/me")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), "account disabled");
        refresh.assert_async().await;
        still_rejected.assert_async().await;
    }

    #[tokio::test]
    async fn missing_refresh_token_skips_refresh_endpoint() {
        let mut server = Server::new_async().await;
        let _stale = server
            .mock("GET", "/me")
            .with_status(401)
            .with_body(r#"{"detail":"token expired"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let tokens = TokenStore::with_tokens("stale", None);
        let client = gateway(&server, tokens.clone()).await;
        let err = client.execute(ApiRequest::get("/me")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), "token expired");
        assert!(!tokens.has_access_token().await);
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn failed_refresh_clears_tokens_and_keeps_original_error() {
        let mut server = Server::new_async().await;
        let original = server
            .mock("DELETE", "/ideas/7")
            .with_status(401)
            .with_body(r#"{"detail":"token expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .with_body(r#"{"detail":"refresh revoked"}"#)
            .expect(1)
            .create_async()
            .await;

        let tokens = TokenStore::with_tokens("stale", Some("r".into()));
        let client = gateway(&server, tokens.clone()).await;
        let err = client
            .execute(ApiRequest::delete("/ideas/7"))
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), "token expired");
        assert!(tokens.access_token().await.is_none());
        assert!(tokens.refresh_token().await.is_none());
        original.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_never_refreshes() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/ideas")
            .with_status(500)
            .with_body(r#"{"detail":"database down"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let tokens = TokenStore::with_tokens("a", Some("r".into()));
        let client = gateway(&server, tokens.clone()).await;
        let err = client.execute(ApiRequest::get("/ideas")).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(err.detail(), "database down");
        assert_eq!(tokens.access_token().await.as_deref(), Some("a"));
        failing.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn already_retried_request_is_not_refreshed() {
        let mut server = Server::new_async().await;
        let _rejected = server
            .mock("GET", "/me")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let tokens = TokenStore::with_tokens("a", Some("r".into()));
        let client = gateway(&server, tokens.clone()).await;
        let err = client
            .execute(ApiRequest::get("/me").mark_retried())
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(tokens.refresh_token().await.as_deref(), Some("r"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn json_body_is_replayed_on_retry() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({"title": "Idea"});
        let _stale = server
            .mock("POST", "/ideas")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh"}"#)
            .create_async()
            .await;
        let replayed = server
            .mock("POST", "/ideas")
            .match_header("authorization", "Bearer fresh")
            .match_body(Matcher::Json(body.clone()))
            .with_status(201)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let client = gateway(&server, TokenStore::with_tokens("stale", Some("r".into()))).await;
        client
            .execute(ApiRequest::post("/ideas").json(&body).unwrap())
            .await
            .unwrap();
        replayed.assert_async().await;
    }

    #[tokio::test]
    async fn query_parameters_are_sent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/comments")
            .match_query(Matcher::UrlEncoded("idea_id".into(), "i-9".into()))
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;

        let client = gateway(&server, TokenStore::new()).await;
        client
            .execute(ApiRequest::get("/comments").query("idea_id", "i-9"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_refresh_empties_shared_cache() {
        let mut server = Server::new_async().await;
        let _rejected = server
            .mock("GET", "/me")
            .with_status(401)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .create_async()
            .await;

        let cache = QueryCache::default();
        cache.put(QueryKey::Ideas, &vec!["private idea"]).await;
        let client = gateway(&server, TokenStore::with_tokens("a", Some("r".into())))
            .await
            .with_cache(cache.clone());

        client.execute(ApiRequest::get("/me")).await.unwrap_err();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_stale_requests_each_recover() {
        let mut server = Server::new_async().await;
        let stale = server
            .mock("GET", Matcher::Regex("^/ideas/(1|2)$".to_string()))
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh"}"#)
            .expect_at_least(1)
            .expect_at_most(2)
            .create_async()
            .await;
        let fresh = server
            .mock("GET", Matcher::Regex("^/ideas/(1|2)$".to_string()))
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let client = gateway(&server, TokenStore::with_tokens("stale", Some("r".into()))).await;
        let (first, second) = tokio::join!(
            client.execute(ApiRequest::get("/ideas/1")),
            client.execute(ApiRequest::get("/ideas/2")),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        stale.assert_async().await;
        refresh.assert_async().await;
        fresh.assert_async().await;
    }

    #[tokio::test]
    async fn multipart_body_is_replayed_on_retry() {
        let mut server = Server::new_async().await;
        let _stale = server
            .mock("POST", "/upload/images")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh"}"#)
            .create_async()
            .await;
        let replayed = server
            .mock("POST", "/upload/images")
            .match_header("authorization", "Bearer fresh")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".to_string()),
            )
            .match_body(Matcher::Regex(
                r#"name="files"; filename="cover.png"[\s\S]*cover-bytes"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"uploaded_urls":["https://cdn.example.com/cover.png"]}"#)
            .expect(1)
            .create_async()
            .await;

        let file = UploadFile::new("cover.png", "image/png", b"cover-bytes".to_vec());
        let client = gateway(&server, TokenStore::with_tokens("stale", Some("r".into()))).await;
        client
            .execute(ApiRequest::post("/upload/images").multipart("files", vec![file]))
            .await
            .unwrap();
        replayed.assert_async().await;
    }
}
