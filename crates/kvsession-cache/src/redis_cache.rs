//! Redis backend.
//!
//! Each contract call maps to exactly one Redis command issued over a shared
//! [`ConnectionManager`], which reconnects on its own after connection loss.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, trace};

use crate::client::{CacheClient, KeyTtl};
use crate::error::Result;

/// [`CacheClient`] backed by a Redis server.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect to the server at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!(url = %url, "Connected to Redis");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_ex(&self, key: &[u8], seconds: u64, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let stored: bool = redis::cmd("SETNX")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(stored)
    }

    async fn set_nx_ex(&self, key: &[u8], seconds: u64, value: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &[u8]) -> Result<usize> {
        let mut conn = self.conn.clone();
        let removed: usize = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let found: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(found)
    }

    async fn expire(&self, key: &[u8], seconds: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut conn)
            .await?;
        Ok(applied)
    }

    async fn ttl(&self, key: &[u8]) -> Result<KeyTtl> {
        let mut conn = self.conn.clone();
        let secs: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(KeyTtl::from_redis_secs(secs))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let keys: Vec<Vec<u8>> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await?;
        trace!(pattern = %pattern, matched = keys.len(), "Key scan");
        Ok(keys)
    }

    async fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn incr_by_float(&self, key: &[u8], delta: f64) -> Result<f64> {
        let mut conn = self.conn.clone();
        let value: f64 = redis::cmd("INCRBYFLOAT")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn h_set(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(added > 0)
    }

    async fn h_get(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn h_del(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("HDEL")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn r_push(&self, key: &[u8], values: &[Vec<u8>]) -> Result<usize> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key);
        for value in values {
            cmd.arg(value.as_slice());
        }
        let len: usize = cmd.query_async(&mut conn).await?;
        Ok(len)
    }

    async fn l_range(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let items: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn l_rem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<usize> {
        let mut conn = self.conn.clone();
        let removed: usize = redis::cmd("LREM")
            .arg(key)
            .arg(count)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn flush_all(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHALL").query_async(&mut conn).await?;
        Ok(())
    }

    async fn db_size(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let size: usize = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(size)
    }
}
