//! Transient per-chunk staging area.
//!
//! Received chunks live here, one file per chunk under a per-session
//! directory, until the merge engine concatenates them into the final
//! artifact. The area is disposable: sessions that never complete are swept
//! by age.

use bytes::{Bytes, BytesMut};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{validate_key, StorageError, StorageResult};

#[derive(Clone)]
pub struct ChunkStagingStore {
    root: PathBuf,
}

impl ChunkStagingStore {
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create staging directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    fn session_dir(&self, upload_id: &str) -> StorageResult<PathBuf> {
        validate_key(upload_id)?;
        if upload_id.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "upload id {:?} contains invalid characters",
                upload_id
            )));
        }
        Ok(self.root.join(upload_id))
    }

    fn chunk_path(dir: &PathBuf, index: u32) -> PathBuf {
        dir.join(format!("{}.chunk", index))
    }

    /// Stage one chunk. Atomic per chunk: a concurrent retry of the same
    /// index ends with exactly one complete chunk file.
    pub async fn put_chunk(&self, upload_id: &str, index: u32, data: Bytes) -> StorageResult<()> {
        let dir = self.session_dir(upload_id)?;
        fs::create_dir_all(&dir).await?;

        let path = Self::chunk_path(&dir, index);
        let tmp_path = dir.join(format!("{}.tmp", index));

        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create chunk {}: {}", tmp_path.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write chunk {}: {}", tmp_path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync chunk {}: {}", tmp_path.display(), e))
        })?;
        drop(file);

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to move chunk into {}: {}", path.display(), e))
        })?;

        tracing::debug!(upload_id = %upload_id, chunk_index = index, size_bytes = data.len(), "Staged chunk");
        Ok(())
    }

    /// Concatenate chunks `0..chunk_count` in index order.
    pub async fn read_ordered(&self, upload_id: &str, chunk_count: u32) -> StorageResult<Bytes> {
        let dir = self.session_dir(upload_id)?;
        let mut merged = BytesMut::new();

        for index in 0..chunk_count {
            let path = Self::chunk_path(&dir, index);
            let data = fs::read(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::NotFound(format!("{}/{}.chunk", upload_id, index))
                } else {
                    StorageError::ReadFailed(format!("Failed to read {}: {}", path.display(), e))
                }
            })?;
            merged.extend_from_slice(&data);
        }

        Ok(merged.freeze())
    }

    /// Drop a session's entire staging directory. Absent directories are fine.
    pub async fn delete_all(&self, upload_id: &str) -> StorageResult<()> {
        let dir = self.session_dir(upload_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete staging dir {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    /// Remove session directories whose last modification is older than
    /// `max_age`. Returns the number of sessions removed. Used by the orphan
    /// sweep for uploads that were abandoned after their coordination state
    /// expired.
    pub async fn sweep_older_than(&self, max_age: Duration) -> StorageResult<usize> {
        let cutoff = SystemTime::now() - max_age;
        let mut removed = 0usize;

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(m) if m.is_dir() => m,
                _ => continue,
            };
            let modified = match meta.modified() {
                Ok(t) => t,
                Err(_) => continue,
            };
            if modified < cutoff {
                if let Err(e) = fs::remove_dir_all(entry.path()).await {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to sweep staging dir");
                    continue;
                }
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Swept abandoned upload sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn staging() -> (TempDir, ChunkStagingStore) {
        let dir = TempDir::new().unwrap();
        let store = ChunkStagingStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn chunks_concatenate_in_index_order() {
        let (_dir, store) = staging().await;
        // arrival order differs from index order
        store.put_chunk("u1", 2, Bytes::from_static(b"cc")).await.unwrap();
        store.put_chunk("u1", 0, Bytes::from_static(b"aa")).await.unwrap();
        store.put_chunk("u1", 1, Bytes::from_static(b"bb")).await.unwrap();

        let merged = store.read_ordered("u1", 3).await.unwrap();
        assert_eq!(&merged[..], b"aabbcc");
    }

    #[tokio::test]
    async fn missing_chunk_fails_the_read() {
        let (_dir, store) = staging().await;
        store.put_chunk("u1", 0, Bytes::from_static(b"aa")).await.unwrap();
        assert!(matches!(
            store.read_ordered("u1", 2).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn re_staging_a_chunk_overwrites_it() {
        let (_dir, store) = staging().await;
        store.put_chunk("u1", 0, Bytes::from_static(b"old")).await.unwrap();
        store.put_chunk("u1", 0, Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(&store.read_ordered("u1", 1).await.unwrap()[..], b"new");
    }

    #[tokio::test]
    async fn delete_all_clears_the_session() {
        let (_dir, store) = staging().await;
        store.put_chunk("u1", 0, Bytes::from_static(b"aa")).await.unwrap();
        store.delete_all("u1").await.unwrap();
        store.delete_all("u1").await.unwrap();
        assert!(matches!(
            store.read_ordered("u1", 1).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sweep_spares_fresh_sessions() {
        let (_dir, store) = staging().await;
        store.put_chunk("fresh", 0, Bytes::from_static(b"aa")).await.unwrap();

        let removed = store.sweep_older_than(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(removed, 0);
        assert!(store.read_ordered("fresh", 1).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_removes_aged_sessions() {
        let (_dir, store) = staging().await;
        store.put_chunk("stale", 0, Bytes::from_static(b"aa")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let removed = store.sweep_older_than(Duration::from_millis(1)).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn upload_ids_with_separators_are_rejected() {
        let (_dir, store) = staging().await;
        assert!(matches!(
            store.put_chunk("../esc", 0, Bytes::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put_chunk("a/b", 0, Bytes::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
