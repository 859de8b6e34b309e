//! Coordination-store abstraction trait.

use async_trait::async_trait;
use std::collections::HashMap;
use strata_core::AppError;
use thiserror::Error;

/// Coordination-store operation errors
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed session state for key {key}: {reason}")]
    Decode { key: String, reason: String },
}

pub type CoordResult<T> = Result<T, CoordError>;

impl From<CoordError> for AppError {
    fn from(err: CoordError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

/// Capability interface over a key/value store with TTL, hash-map records,
/// and atomic single-field writes.
///
/// All session and chunk state goes through this trait so any of many
/// stateless service instances can handle any chunk of any session. Every
/// mutation is a single-key, single-field operation; no multi-step
/// transaction spans a network round trip.
#[async_trait]
pub trait CoordStore: Send + Sync {
    /// Set one field of the hash record at `key`. Creates the record if absent.
    async fn set_field(&self, key: &str, field: &str, value: &str) -> CoordResult<()>;

    /// All fields of the hash record at `key`; empty map if absent.
    async fn get_all(&self, key: &str) -> CoordResult<HashMap<String, String>>;

    /// Whether `key` exists (hash record or plain string).
    async fn exists(&self, key: &str) -> CoordResult<bool>;

    /// Set a TTL on `key`. A no-op if the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> CoordResult<()>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> CoordResult<()>;

    /// Set a plain string value with a TTL (used for the hash -> upload_id index).
    async fn put_string(&self, key: &str, value: &str, ttl_secs: u64) -> CoordResult<()>;

    /// Read a plain string value; `None` if absent or expired.
    async fn get_string(&self, key: &str) -> CoordResult<Option<String>>;
}
