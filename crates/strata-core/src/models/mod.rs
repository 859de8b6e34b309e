//! Domain models shared across Strata components.

pub mod artifact;
pub mod session;
pub mod transfer;

pub use artifact::{ArtifactStatus, FileArtifact, UserFileLink};
pub use session::UploadSession;
pub use transfer::{StorageTier, TransferJob};
