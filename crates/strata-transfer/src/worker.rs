//! Transfer worker loop.

use std::sync::Arc;
use std::time::Duration;
use strata_core::{AppError, ArtifactStatus, TransferJob};
use strata_db::MetadataStore;
use strata_storage::{StorageError, TierRouter};
use tokio::sync::mpsc;

use crate::broker::{Delivery, TransferBroker};

/// Consumes transfer jobs and moves artifact bytes between tiers.
///
/// Acks only after the destination write and the metadata update are both
/// durable; any failure nacks the job back for redelivery. Handling is
/// idempotent, so at-least-once delivery is safe: a redelivered job rewrites
/// the same destination key and re-applies the same metadata update.
pub struct TransferWorker {
    broker: Arc<dyn TransferBroker>,
    router: TierRouter,
    metadata: Arc<dyn MetadataStore>,
    queue: String,
    consume_wait: Duration,
}

impl TransferWorker {
    pub fn new(
        broker: Arc<dyn TransferBroker>,
        router: TierRouter,
        metadata: Arc<dyn MetadataStore>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            router,
            metadata,
            queue: queue.into(),
            consume_wait: Duration::from_secs(5),
        }
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(queue = %self.queue, "Transfer worker started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Transfer worker shutting down");
                    break;
                }
                result = self.broker.consume(&self.queue, self.consume_wait) => {
                    match result {
                        Ok(Some(delivery)) => self.handle(delivery).await,
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to consume from transfer queue");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        tracing::info!("Transfer worker stopped");
    }

    async fn handle(&self, delivery: Delivery) {
        match self.on_transfer_message(&delivery.job).await {
            Ok(()) => {
                if let Err(e) = self.broker.ack(&self.queue, &delivery).await {
                    tracing::error!(
                        content_hash = %delivery.job.content_hash,
                        error = %e,
                        "Ack failed; job may be redelivered"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    content_hash = %delivery.job.content_hash,
                    error = %e,
                    "Transfer failed, nacking for redelivery"
                );
                if let Err(e) = self.broker.nack(&self.queue, &delivery).await {
                    tracing::error!(error = %e, "Nack failed; relying on broker recovery");
                }
            }
        }
    }

    #[tracing::instrument(skip(self, job), fields(content_hash = %job.content_hash, dest = %job.dest_location))]
    pub async fn on_transfer_message(&self, job: &TransferJob) -> Result<(), AppError> {
        let (source, source_key) = self.router.resolve(&job.source_location)?;
        let (dest, dest_key) = self.router.resolve(&job.dest_location)?;

        match source.get(&source_key).await {
            Ok(data) => {
                let size = data.len();
                dest.put(&dest_key, data).await?;
                tracing::debug!(size_bytes = size, "Copied artifact to destination tier");
            }
            Err(StorageError::NotFound(_)) => {
                // redelivered job whose source was already reclaimed; accept
                // only if the bytes made it to the destination earlier
                if !dest.exists(&dest_key).await? {
                    return Err(AppError::NotFound(format!(
                        "transfer source {}",
                        job.source_location
                    )));
                }
                tracing::debug!("Destination already present, treating as replay");
            }
            Err(e) => return Err(e.into()),
        }

        self.metadata
            .update_artifact_location(&job.content_hash, &job.dest_location, ArtifactStatus::Migrated)
            .await?;

        tracing::info!("Artifact migrated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;
    use bytes::Bytes;
    use chrono::Utc;
    use strata_core::{FileArtifact, StorageTier};
    use strata_db::MemoryMetadataStore;
    use strata_storage::{artifact_key, RemoteStore};
    use tempfile::TempDir;

    struct Fixture {
        _dirs: (TempDir, TempDir),
        broker: MemoryBroker,
        router: TierRouter,
        metadata: Arc<MemoryMetadataStore>,
        worker: TransferWorker,
    }

    async fn fixture() -> Fixture {
        let local_dir = TempDir::new().unwrap();
        let cold_dir = TempDir::new().unwrap();
        let router = TierRouter::new()
            .with_tier(
                StorageTier::Local,
                Arc::new(RemoteStore::filesystem(local_dir.path()).unwrap()),
            )
            .with_tier(
                StorageTier::Cold,
                Arc::new(RemoteStore::filesystem(cold_dir.path()).unwrap()),
            );
        let broker = MemoryBroker::new();
        let metadata = Arc::new(MemoryMetadataStore::new());
        let worker = TransferWorker::new(
            Arc::new(broker.clone()),
            router.clone(),
            metadata.clone(),
            "q",
        );
        Fixture {
            _dirs: (local_dir, cold_dir),
            broker,
            router,
            metadata,
            worker,
        }
    }

    async fn seed_artifact(fx: &Fixture, hash: &str, data: &'static [u8]) -> TransferJob {
        let key = artifact_key(hash);
        let source_location = format!("local/{}", key);
        let (store, k) = fx.router.resolve(&source_location).unwrap();
        store.put(&k, Bytes::from_static(data)).await.unwrap();

        fx.metadata
            .insert_artifact_if_absent(&FileArtifact {
                content_hash: hash.to_string(),
                size: data.len() as u64,
                canonical_name: "a.bin".into(),
                location: source_location.clone(),
                status: ArtifactStatus::Active,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        TransferJob {
            content_hash: hash.to_string(),
            source_location,
            dest_location: format!("cold/{}", key),
            dest_tier: StorageTier::Cold,
        }
    }

    #[tokio::test]
    async fn transfer_moves_bytes_and_repoints_metadata() {
        let fx = fixture().await;
        let job = seed_artifact(&fx, "aa", b"payload").await;

        fx.worker.on_transfer_message(&job).await.unwrap();

        let (cold, key) = fx.router.resolve(&job.dest_location).unwrap();
        assert_eq!(cold.get(&key).await.unwrap(), Bytes::from_static(b"payload"));

        let artifact = fx.metadata.get_artifact("aa").await.unwrap().unwrap();
        assert_eq!(artifact.location, job.dest_location);
        assert_eq!(artifact.status, ArtifactStatus::Migrated);
    }

    #[tokio::test]
    async fn redelivered_job_is_a_safe_replay() {
        let fx = fixture().await;
        let job = seed_artifact(&fx, "aa", b"payload").await;

        fx.worker.on_transfer_message(&job).await.unwrap();
        fx.worker.on_transfer_message(&job).await.unwrap();

        let artifact = fx.metadata.get_artifact("aa").await.unwrap().unwrap();
        assert_eq!(artifact.status, ArtifactStatus::Migrated);
    }

    #[tokio::test]
    async fn failed_transfer_is_nacked_for_redelivery() {
        let fx = fixture().await;
        // artifact row exists but no bytes were ever staged at the source
        let job = TransferJob {
            content_hash: "missing".into(),
            source_location: "local/merged/missing".into(),
            dest_location: "cold/merged/missing".into(),
            dest_tier: StorageTier::Cold,
        };
        fx.broker.publish("q", &job).await.unwrap();

        let delivery = fx
            .broker
            .consume("q", Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        fx.worker.handle(delivery).await;

        assert_eq!(fx.broker.queue_len("q").await, 1);
        assert_eq!(fx.broker.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn worker_loop_drains_published_jobs() {
        let fx = fixture().await;
        let job = seed_artifact(&fx, "aa", b"payload").await;
        fx.broker.publish("q", &job).await.unwrap();

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let worker = TransferWorker::new(
            Arc::new(fx.broker.clone()),
            fx.router.clone(),
            fx.metadata.clone(),
            "q",
        );
        let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

        let mut migrated = false;
        for _ in 0..100 {
            if let Some(a) = fx.metadata.get_artifact("aa").await.unwrap() {
                if a.status == ArtifactStatus::Migrated {
                    migrated = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(migrated);
        assert_eq!(fx.broker.in_flight_len().await, 0);

        shutdown_tx.send(()).await.unwrap();
        handle.await.unwrap();
    }
}
