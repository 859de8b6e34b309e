//! Per-chunk receipt: staging, verification, completion.

use bytes::Bytes;
use strata_core::AppError;
use strata_storage::ChunkStagingStore;

use crate::hash::{sha256_hex, verify_sha256};
use crate::session::SessionManager;

/// Accepts one chunk at a time, in any order, from any service instance.
#[derive(Clone)]
pub struct ChunkReceiver {
    sessions: SessionManager,
    staging: ChunkStagingStore,
}

impl ChunkReceiver {
    pub fn new(sessions: SessionManager, staging: ChunkStagingStore) -> Self {
        Self { sessions, staging }
    }

    /// Stage a chunk, verify it against the client-declared hash, and record
    /// its completion flag.
    ///
    /// The payload is staged before verification; on a hash mismatch the
    /// staged bytes stay where a retry of the same index will overwrite them,
    /// and the completion flag is not set. Re-sending an already completed
    /// chunk is a harmless overwrite.
    pub async fn accept_chunk(
        &self,
        upload_id: &str,
        index: u32,
        expected_hash: &str,
        payload: Bytes,
    ) -> Result<(), AppError> {
        let record = self.sessions.load(upload_id).await?;
        if !record.session.contains_index(index) {
            return Err(AppError::InvalidInput(format!(
                "chunk index {} out of range (chunk count {})",
                index, record.session.chunk_count
            )));
        }

        self.staging
            .put_chunk(upload_id, index, payload.clone())
            .await?;

        if !verify_sha256(&payload, expected_hash) {
            return Err(AppError::ChunkIntegrity {
                expected: expected_hash.to_string(),
                actual: sha256_hex(&payload),
            });
        }

        self.sessions.mark_chunk_complete(upload_id, index).await?;
        tracing::debug!(upload_id = %upload_id, chunk_index = index, size_bytes = payload.len(), "Accepted chunk");
        Ok(())
    }
}
