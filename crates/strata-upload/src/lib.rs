//! Strata Upload Pipeline
//!
//! Resumable chunked uploads with content-hash deduplication. The pipeline is
//! stateless above its stores: any instance can initiate a session, accept
//! any chunk, or merge, because every piece of upload state lives in the
//! coordination store, the staging area, or the metadata store.
//!
//! Components map to the upload lifecycle: `SessionManager` (initiate,
//! resume, cancel), `FastPath` (dedup short-circuit), `ChunkReceiver`
//! (per-chunk staging and verification), `MergeEngine` (assembly and
//! durable landing), composed behind the `UploadService` facade.

pub mod chunks;
pub mod dedup;
pub mod hash;
pub mod merge;
pub mod service;
pub mod session;

pub use chunks::ChunkReceiver;
pub use dedup::{FastPath, FastPathOutcome};
pub use hash::{sha256_hex, verify_sha256};
pub use merge::MergeEngine;
pub use service::UploadService;
pub use session::SessionManager;
