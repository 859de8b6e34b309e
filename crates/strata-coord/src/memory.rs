//! In-memory coordination store.
//!
//! Single-process backend for tests and development. TTLs are honored
//! lazily: an expired key is treated as absent on the next access and
//! dropped then.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::{CoordResult, CoordStore};

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    Str(String),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Utc::now() >= t)
    }
}

#[derive(Clone, Default)]
pub struct MemoryCoordStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCoordStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn live_entry(&self, key: &str) -> Option<Entry> {
        let reaped = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(e) if e.is_expired() => true,
                Some(e) => return Some(e.clone()),
                None => return None,
            }
        };
        if reaped {
            self.entries.write().await.remove(key);
        }
        None
    }
}

#[async_trait]
impl CoordStore for MemoryCoordStore {
    async fn set_field(&self, key: &str, field: &str, value: &str) -> CoordResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .and_modify(|e| {
                if e.is_expired() {
                    e.value = Value::Hash(HashMap::new());
                    e.expires_at = None;
                }
            })
            .or_insert_with(|| Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
        match &mut entry.value {
            Value::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
            }
            Value::Str(_) => {
                entry.value = Value::Hash(HashMap::from([(field.to_string(), value.to_string())]));
            }
        }
        Ok(())
    }

    async fn get_all(&self, key: &str) -> CoordResult<HashMap<String, String>> {
        match self.live_entry(key).await {
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields),
            _ => Ok(HashMap::new()),
        }
    }

    async fn exists(&self, key: &str) -> CoordResult<bool> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CoordResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            if !entry.is_expired() {
                entry.expires_at = Some(Utc::now() + Duration::seconds(ttl_secs as i64));
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoordResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn put_string(&self, key: &str, value: &str, ttl_secs: u64) -> CoordResult<()> {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Utc::now() + Duration::seconds(ttl_secs as i64)),
            },
        );
        Ok(())
    }

    async fn get_string(&self, key: &str) -> CoordResult<Option<String>> {
        match self.live_entry(key).await {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s)),
            _ => Ok(None),
        }
    }
}
