//! Content-hash dedup fast path.

use chrono::Utc;
use std::sync::Arc;
use strata_core::{AppError, ArtifactStatus, FileArtifact, UserFileLink};
use strata_db::MetadataStore;

#[derive(Debug)]
pub enum FastPathOutcome {
    /// The bytes already exist; the caller's link was created without any
    /// transfer.
    Hit(FileArtifact),
    /// Unknown content; proceed with the chunked upload.
    Miss,
}

/// Checks whether declared content already exists before any bytes move.
#[derive(Clone)]
pub struct FastPath {
    metadata: Arc<dyn MetadataStore>,
}

impl FastPath {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// On a hit, upsert the user's link to the existing artifact. The race
    /// against a concurrent first upload of the same content is benign: a
    /// miss here merely costs the client a redundant upload whose merge
    /// converges on the same artifact row.
    pub async fn try_fast_upload(
        &self,
        username: &str,
        content_hash: &str,
        display_name: &str,
        size: u64,
    ) -> Result<FastPathOutcome, AppError> {
        let Some(artifact) = self.metadata.get_artifact(content_hash).await? else {
            return Ok(FastPathOutcome::Miss);
        };

        if artifact.size != size {
            tracing::warn!(
                content_hash = %content_hash,
                declared = size,
                stored = artifact.size,
                "Declared size differs from stored artifact; trusting the hash"
            );
        }

        self.metadata
            .upsert_user_link(&UserFileLink {
                username: username.to_string(),
                content_hash: content_hash.to_string(),
                display_name: display_name.to_string(),
                uploaded_at: Utc::now(),
                status: ArtifactStatus::Active,
            })
            .await?;

        tracing::info!(
            username = %username,
            content_hash = %content_hash,
            "Fast-path upload hit, no bytes transferred"
        );
        Ok(FastPathOutcome::Hit(artifact))
    }
}
