//! Cross-tier transfer jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A storage backend class. The core never branches on backend identity
/// beyond choosing source and destination locations for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Node-local disk; the landing tier for merged uploads.
    Local,
    Warm,
    Cold,
}

impl StorageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageTier::Local => "local",
            StorageTier::Warm => "warm",
            StorageTier::Cold => "cold",
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(StorageTier::Local),
            "warm" => Ok(StorageTier::Warm),
            "cold" => Ok(StorageTier::Cold),
            other => Err(format!("unknown storage tier: {}", other)),
        }
    }
}

/// A migration job published to the transfer queue. Transient: exists only in
/// flight between dispatcher and worker, with at-least-once delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferJob {
    pub content_hash: String,
    pub source_location: String,
    pub dest_location: String,
    pub dest_tier: StorageTier,
}

impl TransferJob {
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
