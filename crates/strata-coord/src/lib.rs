//! Strata Coordination Store
//!
//! Ephemeral session and chunk state lives in a shared key/value store with
//! per-key TTL and hash-style multi-field records. This crate defines the
//! `CoordStore` capability trait, a typed codec for session state so the rest
//! of the pipeline never handles untyped field pairs, and two backends: redis
//! (production) and in-memory (tests, single-node development).

pub mod memory;
#[cfg(feature = "coord-redis")]
pub mod redis;
pub mod session_state;
pub mod traits;

pub use memory::MemoryCoordStore;
#[cfg(feature = "coord-redis")]
pub use redis::RedisCoordStore;
pub use session_state::SessionRecord;
pub use traits::{CoordError, CoordResult, CoordStore};
