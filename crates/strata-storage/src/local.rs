//! Local filesystem tier backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{validate_key, ObjectStore, StorageError, StorageResult};

/// Filesystem-backed object store rooted at a single directory.
///
/// Writes go to a sibling `.tmp` file first and are renamed into place after
/// fsync, so a crash mid-write never leaves a partial object at the final key.
#[derive(Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStore { base_path })
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();
        let tmp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", tmp_path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", tmp_path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", tmp_path.display(), e))
        })?;
        drop(file);

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to move file into {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "Stored local object"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::ReadFailed(format!("Failed to read {}: {}", path.display(), e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_round_trip_with_nested_key() {
        let (_dir, store) = store().await;
        store
            .put("merged/deadbeef", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert!(store.exists("merged/deadbeef").await.unwrap());
        assert_eq!(
            store.get("merged/deadbeef").await.unwrap(),
            Bytes::from_static(b"hello")
        );
    }

    #[tokio::test]
    async fn missing_object_reads_as_not_found() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.get("nope").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = store().await;
        store.put("k", Bytes::from_static(b"x")).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.get("../escape").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("/abs", Bytes::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn put_replaces_existing_object() {
        let (_dir, store) = store().await;
        store.put("k", Bytes::from_static(b"one")).await.unwrap();
        store.put("k", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"two"));
    }
}
