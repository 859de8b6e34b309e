//! Upload service facade.

use bytes::Bytes;
use std::sync::Arc;
use strata_core::{AppError, ArtifactStatus, Config, FileArtifact, StorageTier, UserFileLink};
use strata_coord::{CoordStore, SessionRecord};
use strata_db::MetadataStore;
use strata_storage::{ChunkStagingStore, TierRouter};
use strata_transfer::{TransferBroker, TransferDispatcher};

use crate::chunks::ChunkReceiver;
use crate::dedup::{FastPath, FastPathOutcome};
use crate::merge::MergeEngine;
use crate::session::SessionManager;

/// One handle over the whole upload pipeline.
///
/// Composes the session, chunk, dedup, and merge components and, when async
/// migration is enabled, schedules the cross-tier transfer after a merge
/// lands. The merged artifact is durable before scheduling; a broker outage
/// surfaces as `BrokerUnavailable` from `complete` and a retried `complete`
/// re-attempts the scheduling.
pub struct UploadService {
    sessions: SessionManager,
    chunks: ChunkReceiver,
    fast_path: FastPath,
    merge: MergeEngine,
    metadata: Arc<dyn MetadataStore>,
    dispatcher: Option<TransferDispatcher>,
    transfer_dest: StorageTier,
}

impl UploadService {
    pub fn new(
        coord: Arc<dyn CoordStore>,
        metadata: Arc<dyn MetadataStore>,
        staging: ChunkStagingStore,
        router: TierRouter,
        broker: Option<Arc<dyn TransferBroker>>,
        config: &Config,
    ) -> Self {
        let sessions = SessionManager::new(coord, staging.clone(), config);
        let chunks = ChunkReceiver::new(sessions.clone(), staging.clone());
        let fast_path = FastPath::new(metadata.clone());
        let merge = MergeEngine::new(sessions.clone(), staging, router, metadata.clone());
        let dispatcher = broker
            .filter(|_| config.async_transfer_enabled)
            .map(|b| TransferDispatcher::new(b, config.transfer_queue.clone()));

        Self {
            sessions,
            chunks,
            fast_path,
            merge,
            metadata,
            dispatcher,
            transfer_dest: config.transfer_dest_tier,
        }
    }

    pub async fn initiate_or_resume(
        &self,
        username: &str,
        content_hash: &str,
        total_size: u64,
    ) -> Result<SessionRecord, AppError> {
        self.sessions
            .initiate_or_resume(username, content_hash, total_size)
            .await
    }

    pub async fn try_fast_upload(
        &self,
        username: &str,
        content_hash: &str,
        display_name: &str,
        size: u64,
    ) -> Result<FastPathOutcome, AppError> {
        self.fast_path
            .try_fast_upload(username, content_hash, display_name, size)
            .await
    }

    pub async fn accept_chunk(
        &self,
        upload_id: &str,
        index: u32,
        expected_hash: &str,
        payload: Bytes,
    ) -> Result<(), AppError> {
        self.chunks
            .accept_chunk(upload_id, index, expected_hash, payload)
            .await
    }

    /// Merge the upload and, when configured, schedule its migration off the
    /// landing tier.
    pub async fn complete(
        &self,
        upload_id: &str,
        content_hash: &str,
        display_name: &str,
        username: &str,
    ) -> Result<FileArtifact, AppError> {
        let mut artifact = self
            .merge
            .complete(upload_id, content_hash, display_name, username)
            .await?;

        // an artifact still sitting in the landing tier needs a transfer;
        // this also re-schedules when a previous attempt hit a broker outage
        if artifact.status == ArtifactStatus::Active {
            artifact.status = self.schedule_migration(&artifact).await?;
        }

        Ok(artifact)
    }

    /// Returns the status the stored row carries after scheduling.
    async fn schedule_migration(&self, artifact: &FileArtifact) -> Result<ArtifactStatus, AppError> {
        let Some(dispatcher) = &self.dispatcher else {
            return Ok(artifact.status);
        };

        let job = TransferDispatcher::plan_job(artifact, self.transfer_dest);
        dispatcher.schedule_transfer(&job).await?;

        if let Err(e) = self
            .metadata
            .update_artifact_location(
                &artifact.content_hash,
                &artifact.location,
                ArtifactStatus::PendingTransfer,
            )
            .await
        {
            tracing::warn!(
                content_hash = %artifact.content_hash,
                error = %e,
                "Failed to mark artifact pending transfer"
            );
            return Ok(artifact.status);
        }
        Ok(ArtifactStatus::PendingTransfer)
    }

    pub async fn cancel_session(&self, content_hash: &str) -> Result<(), AppError> {
        self.sessions.cancel_session(content_hash).await
    }

    /// Soft-delete the caller's file. Bytes and artifact row stay.
    pub async fn remove_file(&self, username: &str, content_hash: &str) -> Result<(), AppError> {
        self.metadata.mark_removed(username, content_hash).await?;
        Ok(())
    }

    pub async fn list_files(&self, username: &str) -> Result<Vec<UserFileLink>, AppError> {
        Ok(self.metadata.links_for_user(username).await?)
    }

    pub async fn rename_file(
        &self,
        username: &str,
        content_hash: &str,
        new_name: &str,
    ) -> Result<(), AppError> {
        self.metadata
            .rename_link(username, content_hash, new_name)
            .await?;
        Ok(())
    }
}
