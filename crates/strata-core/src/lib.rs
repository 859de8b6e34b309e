//! Strata Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! constants shared across all Strata components: upload sessions, content-
//! addressed file artifacts, user file links, and cross-tier transfer jobs.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ArtifactStatus, FileArtifact, StorageTier, TransferJob, UploadSession, UserFileLink,
};
