//! Merge: staged chunks become one durable artifact.

use chrono::Utc;
use std::sync::Arc;
use strata_core::{AppError, ArtifactStatus, FileArtifact, StorageTier, UserFileLink};
use strata_db::MetadataStore;
use strata_storage::{artifact_key, tier_location, ChunkStagingStore, TierRouter};

use crate::session::SessionManager;

/// Assembles a completed session's chunks into the landing tier and records
/// the artifact.
///
/// Ordering is the durability contract: the merged object is written and the
/// metadata rows exist before any coordination or staging state is deleted.
/// Cleanup failures are logged and left to TTL/sweep reclamation; they never
/// fail a merge that already landed.
#[derive(Clone)]
pub struct MergeEngine {
    sessions: SessionManager,
    staging: ChunkStagingStore,
    router: TierRouter,
    metadata: Arc<dyn MetadataStore>,
}

impl MergeEngine {
    pub fn new(
        sessions: SessionManager,
        staging: ChunkStagingStore,
        router: TierRouter,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            sessions,
            staging,
            router,
            metadata,
        }
    }

    pub async fn complete(
        &self,
        upload_id: &str,
        content_hash: &str,
        display_name: &str,
        username: &str,
    ) -> Result<FileArtifact, AppError> {
        let record = match self.sessions.load(upload_id).await {
            Ok(record) => record,
            Err(AppError::SessionNotFound(_)) => {
                // a concurrent Complete may have merged and purged first; if
                // the artifact exists this call already succeeded
                if let Some(artifact) = self.metadata.get_artifact(content_hash).await? {
                    tracing::info!(upload_id = %upload_id, content_hash = %content_hash, "Merge already completed");
                    return Ok(artifact);
                }
                return Err(AppError::SessionNotFound(upload_id.to_string()));
            }
            Err(e) => return Err(e),
        };

        let expected = record.session.chunk_count;
        let completed = record.completed.len() as u32;
        if completed < expected {
            return Err(AppError::IncompleteUpload {
                completed,
                expected,
            });
        }

        let merged = self.staging.read_ordered(upload_id, expected).await?;
        if merged.len() as u64 != record.session.total_size {
            tracing::warn!(
                upload_id = %upload_id,
                declared = record.session.total_size,
                merged = merged.len(),
                "Merged size differs from declared total"
            );
        }

        let key = artifact_key(content_hash);
        let location = tier_location(StorageTier::Local, &key);
        let size = merged.len() as u64;
        self.router
            .store_for(StorageTier::Local)?
            .put(&key, merged)
            .await?;

        let mut artifact = FileArtifact {
            content_hash: content_hash.to_string(),
            size,
            canonical_name: display_name.to_string(),
            location,
            status: ArtifactStatus::Active,
            created_at: Utc::now(),
        };
        let inserted = self.metadata.insert_artifact_if_absent(&artifact).await?;
        if !inserted {
            // another upload of the same content won the insert; its row is
            // the canonical one
            if let Some(existing) = self.metadata.get_artifact(content_hash).await? {
                artifact = existing;
            }
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

        // durable from here on; reclamation is best-effort
        if let Err(e) = self.sessions.purge(upload_id, content_hash).await {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to purge session keys after merge");
        }
        if let Err(e) = self.staging.delete_all(upload_id).await {
            tracing::warn!(upload_id = %upload_id, error = %e, "Failed to reclaim staged chunks after merge");
        }

        tracing::info!(
            upload_id = %upload_id,
            content_hash = %content_hash,
            size_bytes = size,
            first_upload = inserted,
            "Merged upload"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::ChunkReceiver;
    use crate::hash::sha256_hex;
    use bytes::Bytes;
    use strata_coord::MemoryCoordStore;
    use strata_core::Config;
    use strata_db::MemoryMetadataStore;
    use strata_storage::LocalStore;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        sessions: SessionManager,
        receiver: ChunkReceiver,
        router: TierRouter,
        metadata: Arc<MemoryMetadataStore>,
        merge: MergeEngine,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let staging = ChunkStagingStore::new(dir.path().join("staging")).await.unwrap();
        let local = LocalStore::new(dir.path().join("local")).await.unwrap();
        let router = TierRouter::new().with_tier(StorageTier::Local, Arc::new(local));
        let metadata = Arc::new(MemoryMetadataStore::new());
        let config = Config {
            chunk_size: 4,
            session_ttl_secs: 60,
            ..Config::default()
        };
        let sessions =
            SessionManager::new(Arc::new(MemoryCoordStore::new()), staging.clone(), &config);
        let receiver = ChunkReceiver::new(sessions.clone(), staging.clone());
        let merge = MergeEngine::new(
            sessions.clone(),
            staging.clone(),
            router.clone(),
            metadata.clone(),
        );
        Fixture {
            _dir: dir,
            sessions,
            receiver,
            router,
            metadata,
            merge,
        }
    }

    async fn upload_all(fx: &Fixture, upload_id: &str, data: &[u8], chunk_size: usize) {
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            fx.receiver
                .accept_chunk(
                    upload_id,
                    i as u32,
                    &sha256_hex(chunk),
                    Bytes::copy_from_slice(chunk),
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn merge_lands_the_artifact_and_cleans_up() {
        let fx = fixture().await;
        let data = b"abcdefghij"; // 3 chunks of 4
        let hash = sha256_hex(data);
        let record = fx
            .sessions
            .initiate_or_resume("alice", &hash, data.len() as u64)
            .await
            .unwrap();
        let id = record.session.upload_id.clone();
        upload_all(&fx, &id, data, 4).await;

        let artifact = fx.merge.complete(&id, &hash, "file.bin", "alice").await.unwrap();
        assert_eq!(artifact.size, data.len() as u64);
        assert_eq!(artifact.location, format!("local/merged/{}", hash));

        // bytes are readable at the recorded location
        let (store, key) = fx.router.resolve(&artifact.location).unwrap();
        assert_eq!(&store.get(&key).await.unwrap()[..], data);

        // session and staging are gone
        assert!(fx.sessions.load(&id).await.is_err());
        let links = fx.metadata.links_for_user("alice").await.unwrap();
        assert_eq!(links[0].display_name, "file.bin");
    }

    #[tokio::test]
    async fn premature_merge_counts_the_missing_chunks() {
        let fx = fixture().await;
        let data = b"abcdefghij";
        let hash = sha256_hex(data);
        let record = fx
            .sessions
            .initiate_or_resume("alice", &hash, data.len() as u64)
            .await
            .unwrap();
        let id = record.session.upload_id.clone();

        fx.receiver
            .accept_chunk(&id, 0, &sha256_hex(b"abcd"), Bytes::from_static(b"abcd"))
            .await
            .unwrap();

        match fx.merge.complete(&id, &hash, "file.bin", "alice").await {
            Err(AppError::IncompleteUpload { completed, expected }) => {
                assert_eq!((completed, expected), (1, 3));
            }
            other => panic!("expected IncompleteUpload, got {:?}", other),
        }
        // no side effects: session still resumable, no artifact
        assert!(fx.sessions.load(&id).await.is_ok());
        assert!(fx.metadata.get_artifact(&hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_complete_after_purge_reports_success() {
        let fx = fixture().await;
        let data = b"abcdefghij";
        let hash = sha256_hex(data);
        let record = fx
            .sessions
            .initiate_or_resume("alice", &hash, data.len() as u64)
            .await
            .unwrap();
        let id = record.session.upload_id.clone();
        upload_all(&fx, &id, data, 4).await;

        let first = fx.merge.complete(&id, &hash, "file.bin", "alice").await.unwrap();
        let second = fx.merge.complete(&id, &hash, "file.bin", "alice").await.unwrap();
        assert_eq!(second.content_hash, first.content_hash);
    }

    #[tokio::test]
    async fn complete_for_unknown_session_and_content_fails() {
        let fx = fixture().await;
        assert!(matches!(
            fx.merge.complete("ghost", "nohash", "f", "alice").await,
            Err(AppError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_uploads_of_same_content_converge_on_one_artifact() {
        let fx = fixture().await;
        let data = b"abcdefghij";
        let hash = sha256_hex(data);

        let a = fx
            .sessions
            .initiate_or_resume("alice", &hash, data.len() as u64)
            .await
            .unwrap();
        let id_a = a.session.upload_id.clone();
        upload_all(&fx, &id_a, data, 4).await;
        fx.merge.complete(&id_a, &hash, "alice.bin", "alice").await.unwrap();

        // bob uploaded the same bytes before alice's merge landed; his merge
        // finds the artifact row taken and links to it
        let b = fx
            .sessions
            .initiate_or_resume("bob", &hash, data.len() as u64)
            .await
            .unwrap();
        let id_b = b.session.upload_id.clone();
        upload_all(&fx, &id_b, data, 4).await;
        let artifact = fx.merge.complete(&id_b, &hash, "bob.bin", "bob").await.unwrap();

        assert_eq!(artifact.canonical_name, "alice.bin");
        assert_eq!(fx.metadata.links_for_user("bob").await.unwrap().len(), 1);
    }
}
