use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorRef;
use crate::transport::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub idea_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub child_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn has_replies(&self) -> bool {
        self.child_count > 0
    }

    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(AuthorRef::display_name)
            .unwrap_or("Anonymous User")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    pub idea_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub body: String,
}

impl NewComment {
    pub fn top_level(idea_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            idea_id: idea_id.into(),
            parent_id: None,
            body: body.into(),
        }
    }

    pub fn reply(
        idea_id: impl Into<String>,
        parent_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            idea_id: idea_id.into(),
            parent_id: Some(parent_id.into()),
            body: body.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.body.trim().is_empty() {
            return Err(ApiError::validation("comment body is empty"));
        }
        if self.idea_id.trim().is_empty() {
            return Err(ApiError::validation("comment needs an idea id"));
        }
        Ok(())
    }
}
