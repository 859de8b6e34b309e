//! Strata Storage Library
//!
//! Object-store abstraction and backends for the tiered storage hierarchy.
//! The `ObjectStore` trait is tier-agnostic byte storage; `TierRouter` binds
//! one backend per tier and owns the `{tier}/{key}` location format recorded
//! in artifact metadata. `ChunkStagingStore` is the separate transient area
//! where per-chunk files live until merge.
//!
//! Keys must not contain `..` or a leading `/`; backends reject such keys
//! instead of resolving them.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod remote;
pub mod staging;
pub mod tiers;
pub mod traits;

pub use factory::create_tier_router;
#[cfg(feature = "storage-local")]
pub use local::LocalStore;
pub use remote::RemoteStore;
pub use staging::ChunkStagingStore;
pub use tiers::{artifact_key, parse_location, tier_location, TierRouter};
pub use traits::{ObjectStore, StorageError, StorageResult};
