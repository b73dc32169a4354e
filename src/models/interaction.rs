use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct VoteRequest<'a> {
    pub target_id: &'a str,
    /// 1 casts the vote, 0 withdraws it.
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummary {
    pub idea_id: String,
    #[serde(default)]
    pub count: u64,
    /// Whether the caller currently has a vote on the idea.
    #[serde(default)]
    pub voted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct ReactionRequest<'a> {
    pub idea_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub idea_id: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub reacted: bool,
}
