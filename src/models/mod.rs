pub mod comment;
pub mod idea;
pub mod interaction;
pub mod user;

use serde::{Deserialize, Serialize};

pub use comment::{Comment, NewComment};
pub use idea::{AuthorRef, Idea, IdeaDraft, IdeaVersion, Stage, Visibility};
pub use interaction::{ReactionSummary, VoteSummary};
pub use user::{Credentials, Role, SignupRequest, TokenGrant, UserProfile};

/// Envelope returned by every list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub uploaded_urls: Vec<String>,
}

/// Acknowledgement body of the account-management endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_total_is_optional() {
        let page: ListEnvelope<u32> = serde_json::from_str(r#"{"items":[1,2,3]}"#).unwrap();
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(page.total.is_none());

        let page: ListEnvelope<u32> =
            serde_json::from_str(r#"{"items":[],"total":40}"#).unwrap();
        assert_eq!(page.total, Some(40));
    }

    #[test]
    fn bare_array_is_not_an_envelope() {
        assert!(serde_json::from_str::<ListEnvelope<u32>>("[1,2]").is_err());
    }
}
