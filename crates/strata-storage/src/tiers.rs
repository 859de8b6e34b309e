//! Tier routing and the artifact location format.
//!
//! An artifact's metadata records where its bytes live as a single location
//! string, `{tier}/{key}`. This module owns that format and maps tiers to
//! their backends.

use std::collections::HashMap;
use std::sync::Arc;
use strata_core::StorageTier;

use crate::traits::{ObjectStore, StorageError, StorageResult};

/// Key of a merged artifact within any tier.
pub fn artifact_key(content_hash: &str) -> String {
    format!("merged/{}", content_hash)
}

/// Location string for `key` stored in `tier`.
pub fn tier_location(tier: StorageTier, key: &str) -> String {
    format!("{}/{}", tier.as_str(), key)
}

/// Split a location string back into tier and in-tier key.
pub fn parse_location(location: &str) -> StorageResult<(StorageTier, &str)> {
    let (tier, key) = location.split_once('/').ok_or_else(|| {
        StorageError::InvalidKey(format!("malformed location {:?}", location))
    })?;
    let tier = tier
        .parse()
        .map_err(|_| StorageError::InvalidKey(format!("unknown tier in location {:?}", location)))?;
    if key.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "empty key in location {:?}",
            location
        )));
    }
    Ok((tier, key))
}

/// One backend per configured tier.
#[derive(Clone, Default)]
pub struct TierRouter {
    stores: HashMap<StorageTier, Arc<dyn ObjectStore>>,
}

impl TierRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(mut self, tier: StorageTier, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.insert(tier, store);
        self
    }

    /// The backend serving `tier`.
    pub fn store_for(&self, tier: StorageTier) -> StorageResult<Arc<dyn ObjectStore>> {
        self.stores
            .get(&tier)
            .cloned()
            .ok_or_else(|| StorageError::ConfigError(format!("no backend for tier {}", tier)))
    }

    /// Resolve a metadata location string to its backend and in-tier key.
    pub fn resolve(&self, location: &str) -> StorageResult<(Arc<dyn ObjectStore>, String)> {
        let (tier, key) = parse_location(location)?;
        Ok((self.store_for(tier)?, key.to_string()))
    }
}
