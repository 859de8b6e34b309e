//! Error types module
//!
//! All upload-pipeline errors are unified under the `AppError` enum. The
//! `ErrorMetadata` trait lets callers (e.g. an HTTP layer) distinguish a
//! retry-this-chunk failure from a retry-the-whole-upload failure from a
//! generic server error without matching on variants directly.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "CHUNK_INTEGRITY")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the caller can retry)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The upload session does not exist or has expired. Recoverable by
    /// re-initiating the session; resume-by-hash will restore progress.
    #[error("Upload session not found: {0}")]
    SessionNotFound(String),

    /// A received chunk's hash did not match the client-declared hash.
    /// Recoverable by re-uploading that one chunk.
    #[error("Chunk integrity check failed: expected {expected}, got {actual}")]
    ChunkIntegrity { expected: String, actual: String },

    /// Merge was attempted before every chunk was uploaded.
    #[error("Incomplete upload: {completed}/{expected} chunks present")]
    IncompleteUpload { completed: u32, expected: u32 },

    /// A coordination, metadata, or object store operation failed. Retry
    /// policy belongs to the caller.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A transfer job could not be published even after a reconnect attempt.
    /// The caller must durably record the job for later retry; dropping it
    /// silently is a correctness violation.
    #[error("Transfer broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Static metadata per variant: (error_code, recoverable, log_level).
/// client_message stays per-variant for dynamic content.
fn static_metadata(err: &AppError) -> (&'static str, bool, LogLevel) {
    match err {
        AppError::SessionNotFound(_) => ("SESSION_NOT_FOUND", true, LogLevel::Debug),
        AppError::ChunkIntegrity { .. } => ("CHUNK_INTEGRITY", true, LogLevel::Warn),
        AppError::IncompleteUpload { .. } => ("INCOMPLETE_UPLOAD", true, LogLevel::Debug),
        AppError::StoreUnavailable(_) => ("STORE_UNAVAILABLE", true, LogLevel::Error),
        AppError::BrokerUnavailable(_) => ("BROKER_UNAVAILABLE", true, LogLevel::Error),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        AppError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        AppError::Internal(_) => ("INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => ("INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            AppError::SessionNotFound(id) => {
                format!("Upload session {} not found or expired; re-initiate the upload", id)
            }
            AppError::ChunkIntegrity { .. } => {
                "Chunk failed integrity check; re-upload this chunk".to_string()
            }
            AppError::IncompleteUpload {
                completed,
                expected,
            } => {
                format!(
                    "Upload incomplete: {}/{} chunks present; upload the missing chunks",
                    completed, expected
                )
            }
            AppError::StoreUnavailable(_) => "Storage temporarily unavailable".to_string(),
            AppError::BrokerUnavailable(_) => {
                "Transfer scheduling temporarily unavailable".to_string()
            }
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
