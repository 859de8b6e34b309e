//! Strata Metadata Store
//!
//! Durable metadata for content-addressed artifacts and per-user file links.
//! Artifacts are keyed by content hash and shared between users; links are the
//! per-user view. The `MetadataStore` trait is the seam the upload and
//! transfer pipelines depend on; backends are postgres (production) and
//! in-memory (tests).

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryMetadataStore;
pub use postgres::{connect_pool, run_migrations, PgMetadataStore};
pub use traits::{MetaError, MetaResult, MetadataStore};
