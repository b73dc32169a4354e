use tracing::debug;

use super::path_id;
use crate::cache::QueryKey;
use crate::client::IdeasHub;
use crate::models::interaction::{ReactionRequest, VoteRequest};
use crate::models::{Comment, ListEnvelope, NewComment, ReactionSummary, VoteSummary};
use crate::thread::CommentSource;
use crate::transport::{ApiError, ApiRequest};

impl IdeasHub {
    /// Top-level comments of an idea.
    pub async fn list_comments(&self, idea_id: &str) -> Result<Vec<Comment>, ApiError> {
        let idea_id = path_id("idea", idea_id)?;
        let key = QueryKey::Comments(idea_id.to_string());
        if let Some(comments) = self.cache.get(&key).await {
            return Ok(comments);
        }
        let generation = self.cache.generation().await;
        let page: ListEnvelope<Comment> = self
            .interactions
            .json(ApiRequest::get("/comments").query("idea_id", idea_id))
            .await?;
        self.cache.fill(key, &page.items, generation).await;
        Ok(page.items)
    }

    /// Direct replies to one comment.
    pub async fn list_replies(&self, parent_id: &str) -> Result<Vec<Comment>, ApiError> {
        let parent_id = path_id("comment", parent_id)?;
        let key = QueryKey::Replies(parent_id.to_string());
        if let Some(replies) = self.cache.get(&key).await {
            return Ok(replies);
        }
        let generation = self.cache.generation().await;
        let page: ListEnvelope<Comment> = self
            .interactions
            .json(ApiRequest::get("/comments").query("parent_id", parent_id))
            .await?;
        self.cache.fill(key, &page.items, generation).await;
        Ok(page.items)
    }

    pub async fn add_comment(&self, comment: &NewComment) -> Result<Comment, ApiError> {
        comment.validate()?;
        let mut comment = comment.clone();
        comment.body = comment.body.trim().to_string();
        let created: Comment = self
            .interactions
            .json(ApiRequest::post("/comments").json(&comment)?)
            .await?;

        let mut stale = vec![
            QueryKey::Comments(comment.idea_id.clone()),
            QueryKey::Idea(comment.idea_id.clone()),
            QueryKey::Ideas,
        ];
        if let Some(parent) = &comment.parent_id {
            stale.push(QueryKey::Replies(parent.clone()));
        }
        self.cache.invalidate_all(&stale).await;
        debug!(comment_id = %created.id, idea_id = %created.idea_id, "comment added");
        Ok(created)
    }

    /// Remove a comment through the moderation endpoint.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        let comment_id = path_id("comment", comment_id)?;
        self.interactions
            .execute(ApiRequest::delete(format!("/admin/comments/{comment_id}")))
            .await?;
        // The owning idea is unknown here, so every comment listing goes.
        self.cache
            .invalidate_where(|key| {
                matches!(
                    key,
                    QueryKey::Comments(_) | QueryKey::Replies(_) | QueryKey::Idea(_) | QueryKey::Ideas
                )
            })
            .await;
        debug!(comment_id, "comment deleted");
        Ok(())
    }

    pub async fn vote_summary(&self, idea_id: &str) -> Result<VoteSummary, ApiError> {
        let idea_id = path_id("idea", idea_id)?;
        let key = QueryKey::Votes(idea_id.to_string());
        if let Some(summary) = self.cache.get(&key).await {
            return Ok(summary);
        }
        let generation = self.cache.generation().await;
        let summary: VoteSummary = self
            .interactions
            .json(ApiRequest::get("/votes").query("idea_id", idea_id))
            .await?;
        self.cache.fill(key, &summary, generation).await;
        Ok(summary)
    }

    /// Cast (`true`) or withdraw (`false`) the caller's vote.
    pub async fn set_vote(&self, idea_id: &str, cast: bool) -> Result<VoteSummary, ApiError> {
        let idea_id = path_id("idea", idea_id)?;
        let body = VoteRequest {
            target_id: idea_id,
            value: u8::from(cast),
        };
        let summary: VoteSummary = self
            .interactions
            .json(ApiRequest::post("/votes").json(&body)?)
            .await?;
        self.cache
            .invalidate_all([
                &QueryKey::Votes(idea_id.to_string()),
                &QueryKey::Idea(idea_id.to_string()),
                &QueryKey::Ideas,
            ])
            .await;
        Ok(summary)
    }

    /// Flip the caller's vote based on the current summary.
    pub async fn toggle_vote(&self, idea_id: &str) -> Result<VoteSummary, ApiError> {
        let current = self.vote_summary(idea_id).await?;
        self.set_vote(idea_id, !current.voted).await
    }

    pub async fn reactions(&self, idea_id: &str) -> Result<ReactionSummary, ApiError> {
        let idea_id = path_id("idea", idea_id)?;
        let key = QueryKey::Reactions(idea_id.to_string());
        if let Some(summary) = self.cache.get(&key).await {
            return Ok(summary);
        }
        let generation = self.cache.generation().await;
        let summary: ReactionSummary = self
            .interactions
            .json(ApiRequest::get("/reactions").query("idea_id", idea_id))
            .await?;
        self.cache.fill(key, &summary, generation).await;
        Ok(summary)
    }

    pub async fn toggle_reaction(&self, idea_id: &str) -> Result<ReactionSummary, ApiError> {
        let idea_id = path_id("idea", idea_id)?;
        let summary: ReactionSummary = self
            .interactions
            .json(ApiRequest::post("/reactions").json(&ReactionRequest { idea_id })?)
            .await?;
        self.cache
            .invalidate(&QueryKey::Reactions(idea_id.to_string()))
            .await;
        Ok(summary)
    }
}

impl CommentSource for IdeasHub {
    fn top_level(
        &self,
        idea_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Comment>, ApiError>> + Send {
        self.list_comments(idea_id)
    }

    fn replies(
        &self,
        parent_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Comment>, ApiError>> + Send {
        self.list_replies(parent_id)
    }
}
