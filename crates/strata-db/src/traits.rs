//! Metadata-store abstraction trait.

use async_trait::async_trait;
use strata_core::{AppError, ArtifactStatus, FileArtifact, UserFileLink};
use thiserror::Error;

/// Metadata-store operation errors
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed row for {entity}: {reason}")]
    Decode { entity: String, reason: String },

    #[error("{0} not found")]
    NotFound(String),
}

pub type MetaResult<T> = Result<T, MetaError>;

impl From<MetaError> for AppError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::Database(e) => AppError::StoreUnavailable(e.to_string()),
            MetaError::Decode { .. } => AppError::Internal(err.to_string()),
            MetaError::NotFound(what) => AppError::NotFound(what),
        }
    }
}

/// Durable record keeping for artifacts and user links.
///
/// Artifact rows are write-once per content hash: `insert_artifact_if_absent`
/// is the only creation path, so concurrent first-time uploads of the same
/// bytes converge on a single row without coordination. Links are upserted
/// freely; many links can point at one artifact.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert an artifact row unless one already exists for its content hash.
    /// Returns `true` if this call created the row.
    async fn insert_artifact_if_absent(&self, artifact: &FileArtifact) -> MetaResult<bool>;

    /// Fetch the artifact for a content hash, if any.
    async fn get_artifact(&self, content_hash: &str) -> MetaResult<Option<FileArtifact>>;

    /// Create or replace the caller's link to an artifact.
    async fn upsert_user_link(&self, link: &UserFileLink) -> MetaResult<()>;

    /// Point an artifact at a new storage location with a new status. Used by
    /// the transfer worker after the bytes have landed in the destination tier.
    async fn update_artifact_location(
        &self,
        content_hash: &str,
        location: &str,
        status: ArtifactStatus,
    ) -> MetaResult<()>;

    /// Soft-delete a user's link. The artifact row and its bytes stay.
    async fn mark_removed(&self, username: &str, content_hash: &str) -> MetaResult<()>;

    /// All non-removed links for a user, newest upload first.
    async fn links_for_user(&self, username: &str) -> MetaResult<Vec<UserFileLink>>;

    /// Change the display name on a user's link.
    async fn rename_link(
        &self,
        username: &str,
        content_hash: &str,
        new_name: &str,
    ) -> MetaResult<()>;
}
