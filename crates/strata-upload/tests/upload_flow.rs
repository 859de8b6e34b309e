//! End-to-end upload pipeline tests over in-memory stores.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use strata_coord::MemoryCoordStore;
use strata_core::{AppError, ArtifactStatus, Config, StorageTier};
use strata_db::{MemoryMetadataStore, MetadataStore};
use strata_storage::{ChunkStagingStore, RemoteStore, TierRouter};
use strata_transfer::{MemoryBroker, SupervisedBroker, TransferBroker, TransferWorker};
use strata_upload::{sha256_hex, FastPathOutcome, UploadService};
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Stack {
    _dir: TempDir,
    service: UploadService,
    metadata: Arc<MemoryMetadataStore>,
    router: TierRouter,
    broker: MemoryBroker,
    config: Config,
}

fn test_config() -> Config {
    Config {
        chunk_size: 4,
        session_ttl_secs: 60,
        async_transfer_enabled: true,
        transfer_dest_tier: StorageTier::Cold,
        transfer_queue: "transfer.test".into(),
        ..Config::default()
    }
}

async fn stack() -> Stack {
    stack_with_broker(|broker| Arc::new(broker)).await
}

async fn stack_with_broker<F>(wrap: F) -> Stack
where
    F: FnOnce(MemoryBroker) -> Arc<dyn TransferBroker>,
{
    let dir = TempDir::new().unwrap();
    let staging = ChunkStagingStore::new(dir.path().join("staging")).await.unwrap();
    let router = TierRouter::new()
        .with_tier(
            StorageTier::Local,
            Arc::new(RemoteStore::filesystem(dir.path().join("local")).unwrap()),
        )
        .with_tier(
            StorageTier::Cold,
            Arc::new(RemoteStore::filesystem(dir.path().join("cold")).unwrap()),
        );
    let metadata = Arc::new(MemoryMetadataStore::new());
    let broker = MemoryBroker::new();
    let config = test_config();

    let service = UploadService::new(
        Arc::new(MemoryCoordStore::new()),
        metadata.clone(),
        staging,
        router.clone(),
        Some(wrap(broker.clone())),
        &config,
    );

    Stack {
        _dir: dir,
        service,
        metadata,
        router,
        broker,
        config,
    }
}

async fn upload_chunks(stack: &Stack, upload_id: &str, data: &[u8], indices: &[u32]) {
    for &i in indices {
        let chunk = data
            .chunks(stack.config.chunk_size as usize)
            .nth(i as usize)
            .unwrap();
        stack
            .service
            .accept_chunk(upload_id, i, &sha256_hex(chunk), Bytes::copy_from_slice(chunk))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn full_upload_lifecycle() {
    let stack = stack().await;
    let data = b"abcdefghij"; // chunks: abcd efgh ij
    let hash = sha256_hex(data);

    // unknown content: fast path misses
    let outcome = stack
        .service
        .try_fast_upload("alice", &hash, "report.bin", data.len() as u64)
        .await
        .unwrap();
    assert!(matches!(outcome, FastPathOutcome::Miss));

    let record = stack
        .service
        .initiate_or_resume("alice", &hash, data.len() as u64)
        .await
        .unwrap();
    let id = record.session.upload_id.clone();
    assert_eq!(record.session.chunk_count, 3);

    // two of three chunks present: merge refuses with the counts
    upload_chunks(&stack, &id, data, &[0, 1]).await;
    match stack.service.complete(&id, &hash, "report.bin", "alice").await {
        Err(AppError::IncompleteUpload { completed, expected }) => {
            assert_eq!((completed, expected), (2, 3))
        }
        other => panic!("expected IncompleteUpload, got {:?}", other),
    }

    // last chunk arrives corrupted, then correctly
    let err = stack
        .service
        .accept_chunk(&id, 2, &sha256_hex(b"ij"), Bytes::from_static(b"XY"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ChunkIntegrity { .. }));
    upload_chunks(&stack, &id, data, &[2]).await;

    let artifact = stack
        .service
        .complete(&id, &hash, "report.bin", "alice")
        .await
        .unwrap();
    assert_eq!(artifact.size, data.len() as u64);

    // merged bytes are readable where metadata points
    let (store, key) = stack.router.resolve(&artifact.location).unwrap();
    assert_eq!(&store.get(&key).await.unwrap()[..], data);

    // migration got scheduled and the artifact is marked for it, both in the
    // store and in the returned descriptor
    assert_eq!(stack.broker.queue_len("transfer.test").await, 1);
    let stored = stack.metadata.get_artifact(&hash).await.unwrap().unwrap();
    assert_eq!(stored.status, ArtifactStatus::PendingTransfer);
    assert_eq!(artifact.status, ArtifactStatus::PendingTransfer);

    // the same content from another user is now a fast-path hit
    let outcome = stack
        .service
        .try_fast_upload("bob", &hash, "copy.bin", data.len() as u64)
        .await
        .unwrap();
    assert!(matches!(outcome, FastPathOutcome::Hit(_)));
    assert_eq!(stack.metadata.links_for_user("bob").await.unwrap().len(), 1);
}

#[tokio::test]
async fn interrupted_upload_resumes_with_only_missing_chunks() {
    let stack = stack().await;
    let data = b"abcdefghijklmnopqrst"; // 5 chunks of 4
    let hash = sha256_hex(data);

    let record = stack
        .service
        .initiate_or_resume("alice", &hash, data.len() as u64)
        .await
        .unwrap();
    let id = record.session.upload_id.clone();
    upload_chunks(&stack, &id, data, &[0, 2, 4]).await;

    // client restarts and re-initiates with the same hash
    let resumed = stack
        .service
        .initiate_or_resume("alice", &hash, data.len() as u64)
        .await
        .unwrap();
    assert_eq!(resumed.session.upload_id, id);
    assert_eq!(resumed.completed, [0, 2, 4].into_iter().collect());

    upload_chunks(&stack, &id, data, &[1, 3]).await;
    let artifact = stack
        .service
        .complete(&id, &hash, "big.bin", "alice")
        .await
        .unwrap();
    assert_eq!(artifact.size, data.len() as u64);
}

#[tokio::test]
async fn merged_artifact_migrates_to_the_cold_tier() {
    let stack = stack().await;
    let data = b"abcdefghij";
    let hash = sha256_hex(data);

    let record = stack
        .service
        .initiate_or_resume("alice", &hash, data.len() as u64)
        .await
        .unwrap();
    let id = record.session.upload_id.clone();
    upload_chunks(&stack, &id, data, &[0, 1, 2]).await;
    stack.service.complete(&id, &hash, "f.bin", "alice").await.unwrap();

    let worker = TransferWorker::new(
        Arc::new(stack.broker.clone()),
        stack.router.clone(),
        stack.metadata.clone(),
        stack.config.transfer_queue.clone(),
    );
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let mut migrated = None;
    for _ in 0..100 {
        let artifact = stack.metadata.get_artifact(&hash).await.unwrap().unwrap();
        if artifact.status == ArtifactStatus::Migrated {
            migrated = Some(artifact);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let artifact = migrated.expect("artifact never migrated");
    assert_eq!(artifact.location, format!("cold/merged/{}", hash));

    let (cold, key) = stack.router.resolve(&artifact.location).unwrap();
    assert_eq!(&cold.get(&key).await.unwrap()[..], data);

    shutdown_tx.send(()).await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn broker_outage_fails_complete_loudly_and_retry_reschedules() {
    let stack = stack_with_broker(|broker| {
        Arc::new(SupervisedBroker::with_timing(
            Arc::new(broker),
            Duration::from_millis(5),
            Duration::from_millis(10),
        ))
    })
    .await;
    let data = b"abcdefghij";
    let hash = sha256_hex(data);

    let record = stack
        .service
        .initiate_or_resume("alice", &hash, data.len() as u64)
        .await
        .unwrap();
    let id = record.session.upload_id.clone();
    upload_chunks(&stack, &id, data, &[0, 1, 2]).await;

    stack.broker.set_offline(true);
    let err = stack
        .service
        .complete(&id, &hash, "f.bin", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BrokerUnavailable(_)));

    // the merge itself is durable despite the failed scheduling
    let artifact = stack.metadata.get_artifact(&hash).await.unwrap().unwrap();
    assert_eq!(artifact.status, ArtifactStatus::Active);
    let (store, key) = stack.router.resolve(&artifact.location).unwrap();
    assert_eq!(&store.get(&key).await.unwrap()[..], data);

    // once the broker is back, retrying complete schedules the transfer
    stack.broker.set_offline(false);
    let returned = stack.service.complete(&id, &hash, "f.bin", "alice").await.unwrap();
    assert_eq!(returned.status, ArtifactStatus::PendingTransfer);
    assert_eq!(stack.broker.queue_len("transfer.test").await, 1);
    let artifact = stack.metadata.get_artifact(&hash).await.unwrap().unwrap();
    assert_eq!(artifact.status, ArtifactStatus::PendingTransfer);
}

#[tokio::test]
async fn soft_delete_and_rename_manage_links_not_bytes() {
    let stack = stack().await;
    let data = b"abcdefghij";
    let hash = sha256_hex(data);

    let record = stack
        .service
        .initiate_or_resume("alice", &hash, data.len() as u64)
        .await
        .unwrap();
    let id = record.session.upload_id.clone();
    upload_chunks(&stack, &id, data, &[0, 1, 2]).await;
    stack.service.complete(&id, &hash, "old.bin", "alice").await.unwrap();

    stack.service.rename_file("alice", &hash, "new.bin").await.unwrap();
    let files = stack.service.list_files("alice").await.unwrap();
    assert_eq!(files[0].display_name, "new.bin");

    stack.service.remove_file("alice", &hash).await.unwrap();
    assert!(stack.service.list_files("alice").await.unwrap().is_empty());

    // bytes and the artifact row survive the soft delete
    let artifact = stack.metadata.get_artifact(&hash).await.unwrap().unwrap();
    let (store, key) = stack.router.resolve(&artifact.location).unwrap();
    assert!(store.exists(&key).await.unwrap());
}
