use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transport::ApiError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Seed,
    Prototype,
    Growth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AuthorRef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Anonymous User")
    }
}

/// The revision of an idea currently shown to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaVersion {
    pub title: String,
    #[serde(default)]
    pub short_summary: String,
    #[serde(default)]
    pub body_md: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorRef>,
    pub current_version: IdeaVersion,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Idea {
    pub fn title(&self) -> &str {
        &self.current_version.title
    }

    /// First attachment, used as the feed image.
    pub fn cover_image(&self) -> Option<&str> {
        self.current_version.attachments.first().map(String::as_str)
    }

    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(AuthorRef::display_name)
            .unwrap_or("Anonymous User")
    }
}

/// Payload for creating or editing an idea.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaDraft {
    pub title: String,
    #[serde(default)]
    pub short_summary: String,
    #[serde(default)]
    pub body_md: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl IdeaDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Split a comma separated tag list, dropping blanks.
    pub fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.trim().is_empty() {
            return Err(ApiError::validation("idea title is required"));
        }
        Ok(())
    }

    /// Trimmed copy ready to send.
    pub fn normalized(&self) -> Self {
        let mut draft = self.clone();
        draft.title = draft.title.trim().to_string();
        draft.tags = draft
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        draft.attachments.retain(|a| !a.trim().is_empty());
        draft
    }
}

impl From<&Idea> for IdeaDraft {
    fn from(idea: &Idea) -> Self {
        let version = &idea.current_version;
        Self {
            title: version.title.clone(),
            short_summary: version.short_summary.clone(),
            body_md: version.body_md.clone(),
            tags: idea.tags.clone(),
            visibility: idea.visibility,
            stage: idea.stage,
            attachments: version.attachments.clone(),
        }
    }
}
