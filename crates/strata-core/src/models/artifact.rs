//! Content-addressed file artifacts and user file links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a stored artifact or a user's link to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Stored and readable at `location`.
    Active,
    /// A cross-tier transfer has been scheduled but not yet completed.
    PendingTransfer,
    /// Bytes now live in the destination tier.
    Migrated,
    /// Soft-deleted. Bytes are never physically erased on first delete.
    Removed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Active => "active",
            ArtifactStatus::PendingTransfer => "pending_transfer",
            ArtifactStatus::Migrated => "migrated",
            ArtifactStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ArtifactStatus::Active),
            "pending_transfer" => Ok(ArtifactStatus::PendingTransfer),
            "migrated" => Ok(ArtifactStatus::Migrated),
            "removed" => Ok(ArtifactStatus::Removed),
            other => Err(format!("unknown artifact status: {}", other)),
        }
    }
}

/// A deduplicated, content-addressed stored file.
///
/// `content_hash` is the primary key; uniqueness is enforced at the metadata
/// store with insert-if-absent, so concurrent first-time uploads of the same
/// content converge on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileArtifact {
    pub content_hash: String,
    pub size: u64,
    /// Name recorded by whichever upload created the artifact first.
    pub canonical_name: String,
    /// Storage location within the current tier.
    pub location: String,
    pub status: ArtifactStatus,
    pub created_at: DateTime<Utc>,
}

/// A user's pointer to a shared artifact. Many links may reference one
/// artifact; a link is created on every successful upload, fast-path or full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFileLink {
    pub username: String,
    pub content_hash: String,
    pub display_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: ArtifactStatus,
}
