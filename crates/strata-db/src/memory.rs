//! In-memory metadata store for tests and single-node development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{ArtifactStatus, FileArtifact, UserFileLink};
use tokio::sync::RwLock;

use crate::traits::{MetaError, MetaResult, MetadataStore};

#[derive(Default)]
struct Tables {
    artifacts: HashMap<String, FileArtifact>,
    links: HashMap<(String, String), UserFileLink>,
}

#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_artifact_if_absent(&self, artifact: &FileArtifact) -> MetaResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.artifacts.contains_key(&artifact.content_hash) {
            return Ok(false);
        }
        tables
            .artifacts
            .insert(artifact.content_hash.clone(), artifact.clone());
        Ok(true)
    }

    async fn get_artifact(&self, content_hash: &str) -> MetaResult<Option<FileArtifact>> {
        Ok(self.tables.read().await.artifacts.get(content_hash).cloned())
    }

    async fn upsert_user_link(&self, link: &UserFileLink) -> MetaResult<()> {
        self.tables.write().await.links.insert(
            (link.username.clone(), link.content_hash.clone()),
            link.clone(),
        );
        Ok(())
    }

    async fn update_artifact_location(
        &self,
        content_hash: &str,
        location: &str,
        status: ArtifactStatus,
    ) -> MetaResult<()> {
        let mut tables = self.tables.write().await;
        let artifact = tables
            .artifacts
            .get_mut(content_hash)
            .ok_or_else(|| MetaError::NotFound(format!("artifact {}", content_hash)))?;
        artifact.location = location.to_string();
        artifact.status = status;
        Ok(())
    }

    async fn mark_removed(&self, username: &str, content_hash: &str) -> MetaResult<()> {
        let mut tables = self.tables.write().await;
        let link = tables
            .links
            .get_mut(&(username.to_string(), content_hash.to_string()))
            .ok_or_else(|| MetaError::NotFound(format!("link {}/{}", username, content_hash)))?;
        link.status = ArtifactStatus::Removed;
        Ok(())
    }

    async fn links_for_user(&self, username: &str) -> MetaResult<Vec<UserFileLink>> {
        let tables = self.tables.read().await;
        let mut links: Vec<UserFileLink> = tables
            .links
            .values()
            .filter(|l| l.username == username && l.status != ArtifactStatus::Removed)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(links)
    }

    async fn rename_link(
        &self,
        username: &str,
        content_hash: &str,
        new_name: &str,
    ) -> MetaResult<()> {
        let mut tables = self.tables.write().await;
        let link = tables
            .links
            .get_mut(&(username.to_string(), content_hash.to_string()))
            .filter(|l| l.status != ArtifactStatus::Removed)
            .ok_or_else(|| MetaError::NotFound(format!("link {}/{}", username, content_hash)))?;
        link.display_name = new_name.to_string();
        Ok(())
    }
}
