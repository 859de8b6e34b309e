//! Upload session model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An in-progress chunked upload.
///
/// Sessions are ephemeral: they live in the coordination store under a key
/// derived from `upload_id`, bounded by a TTL, and are deleted once the merge
/// completes. A secondary index maps `content_hash -> upload_id` so a client
/// that re-initiates an upload of the same content resumes the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub upload_id: String,
    /// Client-declared hash of the complete file; primary dedup identity.
    pub content_hash: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UploadSession {
    /// Builds a fresh session. `chunk_count` is always
    /// `ceil(total_size / chunk_size)`.
    pub fn new(
        upload_id: String,
        content_hash: String,
        total_size: u64,
        chunk_size: u64,
        ttl_secs: u64,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            upload_id,
            content_hash,
            total_size,
            chunk_size,
            chunk_count: chunk_count_for(total_size, chunk_size),
            created_at,
            expires_at: created_at + Duration::seconds(ttl_secs as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// True when `index` addresses a chunk of this session.
    pub fn contains_index(&self, index: u32) -> bool {
        index < self.chunk_count
    }

    /// Size in bytes of the chunk at `index` (the final chunk may be short).
    pub fn chunk_len(&self, index: u32) -> u64 {
        let start = index as u64 * self.chunk_size;
        self.total_size.saturating_sub(start).min(self.chunk_size)
    }
}

/// Number of chunks needed to cover `total_size` bytes in `chunk_size` pieces.
pub fn chunk_count_for(total_size: u64, chunk_size: u64) -> u32 {
    total_size.div_ceil(chunk_size) as u32
}
