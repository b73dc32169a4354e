use tracing::{info, warn};

/// Structured session events, emitted on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAudit;

impl SessionAudit {
    pub fn new() -> Self {
        Self
    }

    pub fn login(&self, user_id: Option<&str>, method: &str) {
        info!(target: "audit", event = "login", user_id = user_id.unwrap_or(""), method);
    }

    pub fn logout(&self, user_id: Option<&str>) {
        info!(target: "audit", event = "logout", user_id = user_id.unwrap_or(""));
    }

    pub fn token_refreshed(&self, request_id: &str, refresh_rotated: bool) {
        info!(target: "audit", event = "token_refreshed", request_id, refresh_rotated);
    }

    pub fn refresh_skipped(&self, request_id: &str, reason: &str) {
        warn!(target: "audit", event = "refresh_skipped", request_id, reason);
    }

    pub fn refresh_failed(&self, request_id: &str, reason: &str) {
        warn!(target: "audit", event = "refresh_failed", request_id, reason);
    }

    pub fn storage_failed(&self, operation: &str, error: &str) {
        warn!(target: "audit", event = "storage_failed", operation, error);
    }
}
