//! Redis-backed coordination store.
//!
//! Uses a `ConnectionManager`, which multiplexes one connection and
//! re-establishes it automatically after a drop, so callers never hold a
//! broken handle across requests.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;

use crate::traits::{CoordError, CoordResult, CoordStore};

#[derive(Clone)]
pub struct RedisCoordStore {
    conn: ConnectionManager,
}

impl RedisCoordStore {
    /// Connect to redis at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> CoordResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CoordError::Unavailable(format!("invalid redis url: {}", e)))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CoordError::Unavailable(format!("redis connect failed: {}", e)))?;
        tracing::info!(url = %url, "Connected coordination store");
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn store_err(e: redis::RedisError) -> CoordError {
    CoordError::Unavailable(e.to_string())
}

#[async_trait]
impl CoordStore for RedisCoordStore {
    async fn set_field(&self, key: &str, field: &str, value: &str) -> CoordResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn get_all(&self, key: &str) -> CoordResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn exists(&self, key: &str) -> CoordResult<bool> {
        let mut conn = self.conn.clone();
        redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CoordResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn delete(&self, key: &str) -> CoordResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn put_string(&self, key: &str, value: &str, ttl_secs: u64) -> CoordResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    async fn get_string(&self, key: &str) -> CoordResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_err)
    }
}
