//! Shared constants for the upload pipeline.

/// Default size of a single upload chunk: 5 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Lifetime of an upload session in the coordination store: 12 hours.
/// After this the session is logically dead even if not yet reaped.
pub const SESSION_TTL_SECS: u64 = 43_200;

/// Coordination-store key prefix for the per-session chunk hash map.
pub const SESSION_KEY_PREFIX: &str = "mpart:";

/// Coordination-store key prefix for the `content_hash -> upload_id` index
/// that supports resume-by-hash.
pub const UPLOAD_INDEX_KEY_PREFIX: &str = "uploadhash:";

/// Field-name prefix for per-chunk completion flags on the session hash map.
/// A completed chunk at index `i` is recorded as `chkidx_{i} = "1"`.
pub const CHUNK_FLAG_PREFIX: &str = "chkidx_";

/// Default name of the broker queue carrying cross-tier transfer jobs.
pub const TRANSFER_QUEUE: &str = "strata.transfer";

/// Returns the coordination-store key holding a session's chunk hash map.
pub fn session_key(upload_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, upload_id)
}

/// Returns the coordination-store key indexing a content hash to its session.
pub fn upload_index_key(content_hash: &str) -> String {
    format!("{}{}", UPLOAD_INDEX_KEY_PREFIX, content_hash)
}

/// Returns the completion-flag field name for a chunk index.
pub fn chunk_flag_field(index: u32) -> String {
    format!("{}{}", CHUNK_FLAG_PREFIX, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_helpers_compose_prefixes() {
        assert_eq!(session_key("u1"), "mpart:u1");
        assert_eq!(upload_index_key("abc"), "uploadhash:abc");
        assert_eq!(chunk_flag_field(6), "chkidx_6");
    }
}
