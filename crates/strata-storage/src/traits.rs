//! Storage abstraction trait
//!
//! This module defines the ObjectStore trait that all tier backends must
//! implement.

use async_trait::async_trait;
use bytes::Bytes;
use strata_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("object {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Tier-agnostic byte storage.
///
/// Every tier backend (local filesystem, remote object store) implements this
/// trait, so the merge engine and the transfer worker move bytes between
/// tiers without knowing what sits behind a location.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object. The write is
    /// durable when this returns.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Fetch the object at `key`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Remove the object at `key`. Removing an absent object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether an object exists at `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Reject keys that could escape a backend's root.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "storage key {:?} contains invalid characters",
            key
        )));
    }
    Ok(())
}
