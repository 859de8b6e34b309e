//! Typed codec for session state stored as coordination-store hash fields.
//!
//! The on-store layout is a flat field map: fixed descriptor fields plus one
//! `chkidx_{i} = "1"` flag per completed chunk. This module is the only place
//! that knows that layout; everything above it works with `SessionRecord`.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use strata_core::constants::{chunk_flag_field, CHUNK_FLAG_PREFIX};
use strata_core::UploadSession;

use crate::traits::CoordError;

const F_CONTENT_HASH: &str = "filehash";
const F_TOTAL_SIZE: &str = "filesize";
const F_CHUNK_SIZE: &str = "chunksize";
const F_CHUNK_COUNT: &str = "chunkcount";
const F_CREATED_AT: &str = "createdat";
const F_EXPIRES_AT: &str = "expiresat";

/// A decoded session hash record: the session descriptor plus the set of
/// chunk indices already marked complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: UploadSession,
    pub completed: BTreeSet<u32>,
}

impl SessionRecord {
    pub fn new(session: UploadSession) -> Self {
        Self {
            session,
            completed: BTreeSet::new(),
        }
    }

    /// Descriptor fields for a fresh session, in store layout.
    pub fn descriptor_fields(session: &UploadSession) -> Vec<(String, String)> {
        vec![
            (F_CONTENT_HASH.into(), session.content_hash.clone()),
            (F_TOTAL_SIZE.into(), session.total_size.to_string()),
            (F_CHUNK_SIZE.into(), session.chunk_size.to_string()),
            (F_CHUNK_COUNT.into(), session.chunk_count.to_string()),
            (F_CREATED_AT.into(), session.created_at.to_rfc3339()),
            (F_EXPIRES_AT.into(), session.expires_at.to_rfc3339()),
        ]
    }

    /// The field name marking chunk `index` complete.
    pub fn completion_field(index: u32) -> String {
        chunk_flag_field(index)
    }

    /// Decode a full hash record. Returns `Ok(None)` for an empty map (the
    /// key does not exist or has expired).
    pub fn decode(upload_id: &str, fields: &HashMap<String, String>) -> Result<Option<Self>, CoordError> {
        if fields.is_empty() {
            return Ok(None);
        }

        let get = |name: &str| -> Result<&String, CoordError> {
            fields.get(name).ok_or_else(|| CoordError::Decode {
                key: upload_id.to_string(),
                reason: format!("missing field {}", name),
            })
        };
        let parse_u64 = |name: &str| -> Result<u64, CoordError> {
            get(name)?.parse().map_err(|_| CoordError::Decode {
                key: upload_id.to_string(),
                reason: format!("field {} is not an integer", name),
            })
        };
        let parse_time = |name: &str| -> Result<DateTime<Utc>, CoordError> {
            DateTime::parse_from_rfc3339(get(name)?)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| CoordError::Decode {
                    key: upload_id.to_string(),
                    reason: format!("field {} is not a timestamp", name),
                })
        };

        let session = UploadSession {
            upload_id: upload_id.to_string(),
            content_hash: get(F_CONTENT_HASH)?.clone(),
            total_size: parse_u64(F_TOTAL_SIZE)?,
            chunk_size: parse_u64(F_CHUNK_SIZE)?,
            chunk_count: parse_u64(F_CHUNK_COUNT)? as u32,
            created_at: parse_time(F_CREATED_AT)?,
            expires_at: parse_time(F_EXPIRES_AT)?,
        };

        Ok(Some(Self {
            completed: completed_indices(fields),
            session,
        }))
    }
}

/// Extract the completed chunk indices from a session field map.
pub fn completed_indices(fields: &HashMap<String, String>) -> BTreeSet<u32> {
    fields
        .iter()
        .filter(|(_, v)| v.as_str() == "1")
        .filter_map(|(k, _)| k.strip_prefix(CHUNK_FLAG_PREFIX))
        .filter_map(|idx| idx.parse().ok())
        .collect()
}
