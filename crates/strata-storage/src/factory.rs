#[cfg(feature = "storage-local")]
use crate::LocalStore;
use crate::{RemoteStore, StorageError, StorageResult, TierRouter};
use std::sync::Arc;
use strata_core::{Config, StorageTier};

/// Build the tier router from configuration.
///
/// The local (landing) tier is always filesystem-backed. The cold tier is S3
/// when a bucket is configured and the `storage-s3` feature is enabled,
/// otherwise it falls back to its configured directory.
pub async fn create_tier_router(config: &Config) -> StorageResult<TierRouter> {
    #[cfg(feature = "storage-local")]
    {
        let local = LocalStore::new(&config.local_tier_root).await?;
        let warm = RemoteStore::filesystem(&config.warm_tier_root)?;
        let cold = create_cold_store(config)?;

        Ok(TierRouter::new()
            .with_tier(StorageTier::Local, Arc::new(local))
            .with_tier(StorageTier::Warm, Arc::new(warm))
            .with_tier(StorageTier::Cold, cold))
    }

    #[cfg(not(feature = "storage-local"))]
    {
        let _ = config;
        Err(StorageError::ConfigError(
            "Local tier backend not available (storage-local feature not enabled)".to_string(),
        ))
    }
}

#[cfg(feature = "storage-s3")]
fn create_cold_store(config: &Config) -> StorageResult<Arc<RemoteStore>> {
    match &config.s3_bucket {
        Some(bucket) => {
            let region = config.s3_region.as_deref().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION not configured".to_string())
            })?;
            tracing::info!(bucket = %bucket, region = %region, "Cold tier backed by S3");
            Ok(Arc::new(RemoteStore::s3(
                bucket,
                region,
                config.s3_endpoint.as_deref(),
            )?))
        }
        None => Ok(Arc::new(RemoteStore::filesystem(&config.cold_tier_root)?)),
    }
}

#[cfg(not(feature = "storage-s3"))]
fn create_cold_store(config: &Config) -> StorageResult<Arc<RemoteStore>> {
    Ok(Arc::new(RemoteStore::filesystem(&config.cold_tier_root)?))
}
