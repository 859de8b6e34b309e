//! Upload session lifecycle.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use strata_core::constants::{session_key, upload_index_key};
use strata_core::{AppError, Config, UploadSession};
use strata_coord::{CoordStore, SessionRecord};
use strata_storage::ChunkStagingStore;

/// Creates, resumes, loads, and cancels upload sessions.
///
/// Session identity is two coordination-store keys: the session hash record
/// under `mpart:{upload_id}`, and the `uploadhash:{content_hash}` index that
/// lets a re-initiated upload of the same content find its session and skip
/// chunks already staged. Both carry the same TTL.
#[derive(Clone)]
pub struct SessionManager {
    coord: Arc<dyn CoordStore>,
    staging: ChunkStagingStore,
    chunk_size: u64,
    ttl_secs: u64,
}

impl SessionManager {
    pub fn new(coord: Arc<dyn CoordStore>, staging: ChunkStagingStore, config: &Config) -> Self {
        Self {
            coord,
            staging,
            chunk_size: config.chunk_size,
            ttl_secs: config.session_ttl_secs,
        }
    }

    /// Resume the session indexed by `content_hash`, or start a fresh one.
    /// Returns the session plus the set of chunk indices already completed,
    /// so the client uploads only what is missing.
    pub async fn initiate_or_resume(
        &self,
        username: &str,
        content_hash: &str,
        total_size: u64,
    ) -> Result<SessionRecord, AppError> {
        if username.is_empty() {
            return Err(AppError::InvalidInput("username must not be empty".into()));
        }
        if content_hash.is_empty() {
            return Err(AppError::InvalidInput(
                "content hash must not be empty".into(),
            ));
        }
        if total_size == 0 {
            return Err(AppError::InvalidInput(
                "total size must be greater than zero".into(),
            ));
        }

        let index_key = upload_index_key(content_hash);
        if let Some(upload_id) = self.coord.get_string(&index_key).await? {
            let fields = self.coord.get_all(&session_key(&upload_id)).await?;
            match SessionRecord::decode(&upload_id, &fields) {
                Ok(Some(record)) if !record.session.is_expired() => {
                    tracing::info!(
                        upload_id = %upload_id,
                        completed = record.completed.len(),
                        chunk_count = record.session.chunk_count,
                        "Resuming upload session"
                    );
                    return Ok(record);
                }
                // stale index: the session expired underneath it
                Ok(_) => {}
                // malformed state is treated like an expired session; TTL
                // reclaims the bad record
                Err(e) => {
                    tracing::warn!(upload_id = %upload_id, error = %e, "Discarding malformed session state");
                }
            }
        }

        let upload_id = format!("{}{:x}", username, unix_nanos());
        let session = UploadSession::new(
            upload_id.clone(),
            content_hash.to_string(),
            total_size,
            self.chunk_size,
            self.ttl_secs,
        );

        let skey = session_key(&upload_id);
        for (field, value) in SessionRecord::descriptor_fields(&session) {
            self.coord.set_field(&skey, &field, &value).await?;
        }
        self.coord.expire(&skey, self.ttl_secs).await?;
        self.coord
            .put_string(&index_key, &upload_id, self.ttl_secs)
            .await?;

        tracing::info!(
            upload_id = %upload_id,
            content_hash = %content_hash,
            total_size,
            chunk_count = session.chunk_count,
            "Initiated upload session"
        );
        Ok(SessionRecord::new(session))
    }

    /// Load a live session. Absent, expired, or malformed state reads as
    /// `SessionNotFound`; the client re-initiates and resumes by hash.
    pub async fn load(&self, upload_id: &str) -> Result<SessionRecord, AppError> {
        let fields = self.coord.get_all(&session_key(upload_id)).await?;
        match SessionRecord::decode(upload_id, &fields) {
            Ok(Some(record)) if !record.session.is_expired() => Ok(record),
            Ok(_) => Err(AppError::SessionNotFound(upload_id.to_string())),
            Err(e) => {
                tracing::warn!(upload_id = %upload_id, error = %e, "Discarding malformed session state");
                Err(AppError::SessionNotFound(upload_id.to_string()))
            }
        }
    }

    /// Record one chunk as completed. Idempotent: re-setting the flag is a
    /// plain overwrite.
    pub async fn mark_chunk_complete(&self, upload_id: &str, index: u32) -> Result<(), AppError> {
        self.coord
            .set_field(
                &session_key(upload_id),
                &SessionRecord::completion_field(index),
                "1",
            )
            .await?;
        Ok(())
    }

    /// Drop both coordination keys for a completed or abandoned session.
    pub async fn purge(&self, upload_id: &str, content_hash: &str) -> Result<(), AppError> {
        self.coord.delete(&session_key(upload_id)).await?;
        self.coord.delete(&upload_index_key(content_hash)).await?;
        Ok(())
    }

    /// Explicitly abandon the session for `content_hash`, reclaiming its
    /// coordination keys and staged bytes early instead of waiting for
    /// TTL + sweep. Cancelling an unknown hash is a no-op.
    pub async fn cancel_session(&self, content_hash: &str) -> Result<(), AppError> {
        let index_key = upload_index_key(content_hash);
        let Some(upload_id) = self.coord.get_string(&index_key).await? else {
            return Ok(());
        };

        self.purge(&upload_id, content_hash).await?;
        if let Err(e) = self.staging.delete_all(&upload_id).await {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to reclaim staged chunks on cancel");
        }

        tracing::info!(upload_id = %upload_id, content_hash = %content_hash, "Cancelled upload session");
        Ok(())
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
