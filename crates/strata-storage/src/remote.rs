//! Remote tier backend over the `object_store` crate.
//!
//! Wraps any `object_store` implementation behind the crate's `ObjectStore`
//! trait. Production cold tiers use S3 (behind the `storage-s3` feature);
//! the filesystem constructor serves warm tiers on mounted volumes and tests.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::path::Path as RemotePath;
use object_store::{ObjectStore as _, PutPayload};
use std::path::Path;
use std::sync::Arc;

use crate::traits::{validate_key, ObjectStore, StorageError, StorageResult};

#[derive(Clone)]
pub struct RemoteStore {
    inner: Arc<dyn object_store::ObjectStore>,
}

impl RemoteStore {
    pub fn new(inner: Arc<dyn object_store::ObjectStore>) -> Self {
        Self { inner }
    }

    /// A remote-style store rooted at a local directory (mounted volume, tests).
    pub fn filesystem(root: impl AsRef<Path>) -> StorageResult<Self> {
        std::fs::create_dir_all(root.as_ref()).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.as_ref().display(),
                e
            ))
        })?;
        let fs = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        Ok(Self::new(Arc::new(fs)))
    }

    /// An S3-backed store. Credentials come from the environment.
    #[cfg(feature = "storage-s3")]
    pub fn s3(bucket: &str, region: &str, endpoint: Option<&str>) -> StorageResult<Self> {
        let mut builder = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region);
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let s3 = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        Ok(Self::new(Arc::new(s3)))
    }

    fn remote_path(key: &str) -> StorageResult<RemotePath> {
        validate_key(key)?;
        RemotePath::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

fn map_err(key: &str, err: object_store::Error) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
        other => StorageError::BackendError(other.to_string()),
    }
}

#[async_trait]
impl ObjectStore for RemoteStore {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = Self::remote_path(key)?;
        self.inner
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| map_err(key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = Self::remote_path(key)?;
        let result = self.inner.get(&path).await.map_err(|e| map_err(key, e))?;
        result.bytes().await.map_err(|e| map_err(key, e))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = Self::remote_path(key)?;
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(map_err(key, e)),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = Self::remote_path(key)?;
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(map_err(key, e)),
        }
    }
}
