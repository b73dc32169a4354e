use tracing::{debug, info};

use super::path_id;
use crate::cache::QueryKey;
use crate::client::IdeasHub;
use crate::models::{Idea, IdeaDraft, ListEnvelope, UploadResponse};
use crate::transport::{ApiError, ApiRequest, UploadFile};

impl IdeasHub {
    /// The feed, served from cache while fresh.
    pub async fn list_ideas(&self) -> Result<Vec<Idea>, ApiError> {
        if let Some(ideas) = self.cache.get(&QueryKey::Ideas).await {
            return Ok(ideas);
        }
        let generation = self.cache.generation().await;
        let page: ListEnvelope<Idea> = self.primary.json(ApiRequest::get("/ideas")).await?;
        debug!(count = page.items.len(), total = ?page.total, "ideas fetched");
        self.cache.fill(QueryKey::Ideas, &page.items, generation).await;
        Ok(page.items)
    }

    pub async fn get_idea(&self, id: &str) -> Result<Idea, ApiError> {
        let id = path_id("idea", id)?;
        let key = QueryKey::Idea(id.to_string());
        if let Some(idea) = self.cache.get(&key).await {
            return Ok(idea);
        }
        let generation = self.cache.generation().await;
        let idea: Idea = self
            .primary
            .json(ApiRequest::get(format!("/ideas/{id}")))
            .await?;
        self.cache.fill(key, &idea, generation).await;
        Ok(idea)
    }

    pub async fn create_idea(&self, draft: &IdeaDraft) -> Result<Idea, ApiError> {
        draft.validate()?;
        let idea: Idea = self
            .primary
            .json(ApiRequest::post("/ideas").json(&draft.normalized())?)
            .await?;
        self.cache.invalidate(&QueryKey::Ideas).await;
        info!(idea_id = %idea.id, "idea created");
        Ok(idea)
    }

    pub async fn update_idea(&self, id: &str, draft: &IdeaDraft) -> Result<Idea, ApiError> {
        let id = path_id("idea", id)?;
        draft.validate()?;
        let idea: Idea = self
            .primary
            .json(ApiRequest::put(format!("/ideas/{id}")).json(&draft.normalized())?)
            .await?;
        self.cache
            .invalidate_all([&QueryKey::Ideas, &QueryKey::Idea(id.to_string())])
            .await;
        info!(idea_id = %idea.id, "idea updated");
        Ok(idea)
    }

    pub async fn delete_idea(&self, id: &str) -> Result<(), ApiError> {
        let id = path_id("idea", id)?;
        self.primary
            .execute(ApiRequest::delete(format!("/ideas/{id}")))
            .await?;
        self.cache.invalidate_idea(id).await;
        info!(idea_id = %id, "idea deleted");
        Ok(())
    }

    /// Upload images and return their hosted URLs.
    pub async fn upload_images(&self, files: Vec<UploadFile>) -> Result<Vec<String>, ApiError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let count = files.len();
        let uploaded: UploadResponse = self
            .primary
            .json(ApiRequest::post("/upload/images").multipart("files", files))
            .await?;
        debug!(files = count, urls = uploaded.uploaded_urls.len(), "images uploaded");
        Ok(uploaded.uploaded_urls)
    }

    /// Upload any new files, append their URLs to the draft's existing
    /// attachments, then create the idea or update `existing_id`.
    pub async fn submit_idea(
        &self,
        existing_id: Option<&str>,
        draft: &IdeaDraft,
        new_files: Vec<UploadFile>,
    ) -> Result<Idea, ApiError> {
        draft.validate()?;
        let existing_id = existing_id.map(|id| path_id("idea", id)).transpose()?;
        let mut draft = draft.clone();
        let urls = self.upload_images(new_files).await?;
        draft.attachments.extend(urls);
        match existing_id {
            Some(id) => self.update_idea(id, &draft).await,
            None => self.create_idea(&draft).await,
        }
    }
}
