pub mod gateway;

use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use gateway::GatewayClient;

/// Every failure a backend call can surface to the presentation layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("request failed with status {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid json in {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Rejected client-side before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("session storage: {0}")]
    Storage(#[from] std::io::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Message suitable for a user-facing notification.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    pub(crate) async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string())
        });
        ApiError::Status { status, detail }
    }
}

/// Pull the human readable message out of an error body.
///
/// The backend reports errors as `{"detail": ...}` where `detail` is either a
/// plain string, a list of validation entries carrying `msg`, or an object
/// with one of `msg`, `message` or `error`.
pub fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return Some(trimmed.to_string()),
    };
    let detail = value.get("detail")?;
    match detail {
        Value::String(s) => Some(s.clone()),
        Value::Array(entries) => {
            let msgs: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                Some(detail.to_string())
            } else {
                Some(msgs.join(", "))
            }
        }
        Value::Object(map) => ["msg", "message", "error"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(detail.to_string())),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// A file queued for multipart upload. Bytes are held in memory so the body
/// can be rebuilt when a request is replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &std::path::Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime = mime_for(&file_name).to_string();
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart { field: String, files: Vec<UploadFile> },
}

/// One logical API call. The `retried` marker travels with the request so
/// concurrent calls each get their own single refresh attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: RequestBody,
    pub(crate) authorization: Option<String>,
    pub(crate) retried: bool,
    pub(crate) request_id: String,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            authorization: None,
            retried: false,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|source| ApiError::Json {
            context: "request body",
            source,
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, field: impl Into<String>, files: Vec<UploadFile>) -> Self {
        self.body = RequestBody::Multipart {
            field: field.into(),
            files,
        };
        self
    }

    /// Mark the request as already replayed; a 401 will then propagate
    /// without a refresh attempt.
    pub fn mark_retried(mut self) -> Self {
        self.retried = true;
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_from_plain_string() {
        assert_eq!(
            extract_detail(r#"{"detail":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
    }

    #[test]
    fn detail_joins_validation_entries() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"field required"},{"msg":"too short"}]}"#;
        assert_eq!(
            extract_detail(body).as_deref(),
            Some("field required, too short")
        );
    }

    #[test]
    fn detail_from_object_prefers_msg_then_message() {
        assert_eq!(
            extract_detail(r#"{"detail":{"msg":"Token invalid"}}"#).as_deref(),
            Some("Token invalid")
        );
        assert_eq!(
            extract_detail(r#"{"detail":{"message":"expired"}}"#).as_deref(),
            Some("expired")
        );
    }

    #[test]
    fn detail_falls_back_to_raw_text() {
        assert_eq!(extract_detail("Bad Gateway").as_deref(), Some("Bad Gateway"));
        assert_eq!(extract_detail("   "), None);
        assert_eq!(extract_detail(r#"{"other":1}"#), None);
    }

    #[test]
    fn request_builder_tracks_retry_marker() {
        let req = ApiRequest::get("/ideas").query("page", "2");
        assert!(!req.is_retried());
        assert_eq!(req.query, vec![("page".to_string(), "2".to_string())]);
        assert!(req.mark_retried().is_retried());
    }

    #[test]
    fn each_request_gets_its_own_id() {
        let a = ApiRequest::get("/me");
        let b = ApiRequest::get("/me");
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn mime_guess_from_extension() {
        assert_eq!(mime_for("photo.JPG"), "image/jpeg");
        assert_eq!(mime_for("diagram.png"), "image/png");
        assert_eq!(mime_for("notes"), "application/octet-stream");
    }

    #[test]
    fn unauthorized_is_detected_from_status() {
        let err = ApiError::Status {
            status: StatusCode::UNAUTHORIZED,
            detail: "expired".into(),
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), "expired");
        assert!(!ApiError::validation("nope").is_unauthorized());
    }
}
