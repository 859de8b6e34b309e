//! Transfer job dispatch.

use std::sync::Arc;
use strata_core::{AppError, FileArtifact, StorageTier, TransferJob};
use strata_storage::{artifact_key, tier_location};

use crate::broker::TransferBroker;

/// Publishes migration jobs for merged artifacts.
///
/// Expects a supervised broker: transient publish failures are retried one
/// layer down, and what escapes here is a real `BrokerUnavailable` the caller
/// must handle. The merged artifact is durable either way; only the migration
/// is deferred.
pub struct TransferDispatcher {
    broker: Arc<dyn TransferBroker>,
    queue: String,
}

impl TransferDispatcher {
    pub fn new(broker: Arc<dyn TransferBroker>, queue: impl Into<String>) -> Self {
        Self {
            broker,
            queue: queue.into(),
        }
    }

    /// Job moving `artifact` from where it currently lives to `dest_tier`.
    pub fn plan_job(artifact: &FileArtifact, dest_tier: StorageTier) -> TransferJob {
        TransferJob {
            content_hash: artifact.content_hash.clone(),
            source_location: artifact.location.clone(),
            dest_location: tier_location(dest_tier, &artifact_key(&artifact.content_hash)),
            dest_tier,
        }
    }

    pub async fn schedule_transfer(&self, job: &TransferJob) -> Result<(), AppError> {
        self.broker.publish(&self.queue, job).await?;
        tracing::info!(
            content_hash = %job.content_hash,
            dest_tier = %job.dest_tier,
            queue = %self.queue,
            "Scheduled transfer"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;
    use chrono::Utc;
    use strata_core::ArtifactStatus;

    fn artifact() -> FileArtifact {
        FileArtifact {
            content_hash: "deadbeef".into(),
            size: 10,
            canonical_name: "a.bin".into(),
            location: "local/merged/deadbeef".into(),
            status: ArtifactStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn planned_job_targets_the_destination_tier() {
        let job = TransferDispatcher::plan_job(&artifact(), StorageTier::Cold);
        assert_eq!(job.source_location, "local/merged/deadbeef");
        assert_eq!(job.dest_location, "cold/merged/deadbeef");
        assert_eq!(job.dest_tier, StorageTier::Cold);
    }

    #[tokio::test]
    async fn schedule_enqueues_one_job() {
        let broker = MemoryBroker::new();
        let dispatcher = TransferDispatcher::new(Arc::new(broker.clone()), "q");

        let job = TransferDispatcher::plan_job(&artifact(), StorageTier::Cold);
        dispatcher.schedule_transfer(&job).await.unwrap();
        assert_eq!(broker.queue_len("q").await, 1);
    }

    #[tokio::test]
    async fn broker_outage_surfaces_as_broker_unavailable() {
        let broker = MemoryBroker::new();
        broker.set_offline(true);
        let dispatcher = TransferDispatcher::new(Arc::new(broker), "q");

        let job = TransferDispatcher::plan_job(&artifact(), StorageTier::Cold);
        assert!(matches!(
            dispatcher.schedule_transfer(&job).await,
            Err(AppError::BrokerUnavailable(_))
        ));
    }
}
