//! Atomic cache primitives for locks, counters, and queues.
//!
//! [`CacheOps`] is a thin typed layer over [`CacheClient`]: keys are strings,
//! structured values go through the codec, and every method maps to a single
//! cache command (two for [`CacheOps::set_if_absent`] when it refreshes the
//! TTL of an existing key). Nothing is locked in-process; atomicity is
//! whatever the cache gives per command.

use std::sync::Arc;

use kvsession_cache::{CacheClient, KeyTtl};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::codec::{Codec, JsonCodec, decode_optional};
use crate::error::{Result, StoreError};

/// Lifetime applied by the `*_default` helpers (one hour).
pub const DEFAULT_TTL_SECS: u64 = 60 * 60;

/// Typed helpers over a shared cache client.
#[derive(Clone)]
pub struct CacheOps<C = JsonCodec> {
    cache: Arc<dyn CacheClient>,
    codec: C,
}

impl<C> std::fmt::Debug for CacheOps<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOps").finish_non_exhaustive()
    }
}

impl CacheOps {
    /// Create helpers using the JSON codec.
    pub fn new(cache: Arc<dyn CacheClient>) -> Self {
        Self {
            cache,
            codec: JsonCodec,
        }
    }
}

fn require_ttl(ttl_secs: u64) -> Result<()> {
    if ttl_secs == 0 {
        return Err(StoreError::InvalidInput(
            "ttl must be at least one second".to_string(),
        ));
    }
    Ok(())
}

impl<C: Codec> CacheOps<C> {
    /// Swap the value codec.
    pub fn with_codec<C2: Codec>(self, codec: C2) -> CacheOps<C2> {
        CacheOps {
            cache: self.cache,
            codec,
        }
    }

    // ── Conditional set ─────────────────────────────────────────────────

    /// Store `value` only if `key` is absent.
    ///
    /// A stored value gets its TTL in the same command (`SET NX EX`), so a
    /// lock key never exists without an expiry. An existing key has its TTL
    /// reset when `refresh_ttl_on_existing` is set. Returns whether the value
    /// was stored.
    pub async fn set_if_absent<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
        refresh_ttl_on_existing: bool,
    ) -> Result<bool> {
        require_ttl(ttl_secs)?;
        let bytes = self.codec.encode(value)?;

        let stored = self.cache.set_nx_ex(key.as_bytes(), ttl_secs, &bytes).await?;
        if !stored && refresh_ttl_on_existing {
            self.cache.expire(key.as_bytes(), ttl_secs).await?;
        }
        debug!(key, stored, ttl_secs, "set_if_absent");
        Ok(stored)
    }

    /// [`set_if_absent`](Self::set_if_absent) with a one-hour TTL that is
    /// refreshed on existing keys.
    pub async fn set_if_absent_default<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<bool> {
        self.set_if_absent(key, value, DEFAULT_TTL_SECS, true).await
    }

    // ── Counters ────────────────────────────────────────────────────────

    /// Add `delta` to the integer at `key`; a missing key counts from 0.
    pub async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let value = self.cache.incr_by(key.as_bytes(), delta).await?;
        debug!(key, delta, value, "increment");
        Ok(value)
    }

    /// Subtract `delta` from the integer at `key`.
    pub async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        let negated = delta.checked_neg().ok_or_else(|| {
            StoreError::InvalidInput(format!("cannot decrement by {delta}"))
        })?;
        let value = self.cache.incr_by(key.as_bytes(), negated).await?;
        debug!(key, delta, value, "decrement");
        Ok(value)
    }

    /// Increment by one.
    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.increment(key, 1).await
    }

    /// Decrement by one.
    pub async fn decr(&self, key: &str) -> Result<i64> {
        self.decrement(key, 1).await
    }

    /// Add `delta` to the float at `key`; a missing key counts from 0.
    pub async fn increment_float(&self, key: &str, delta: f64) -> Result<f64> {
        let value = self.cache.incr_by_float(key.as_bytes(), delta).await?;
        debug!(key, delta, value, "increment_float");
        Ok(value)
    }

    // ── Lists ───────────────────────────────────────────────────────────

    /// Append raw `values` to the list at `key`. Returns the new length.
    pub async fn list_append<V: AsRef<[u8]>>(&self, key: &str, values: &[V]) -> Result<usize> {
        if values.is_empty() {
            return Err(StoreError::InvalidInput(
                "list_append needs at least one value".to_string(),
            ));
        }
        let values: Vec<Vec<u8>> = values.iter().map(|v| v.as_ref().to_vec()).collect();
        let len = self.cache.r_push(key.as_bytes(), &values).await?;
        debug!(key, appended = values.len(), len, "list_append");
        Ok(len)
    }

    /// Elements `start..=end`; negative indices count from the tail.
    pub async fn list_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        let items = self.cache.l_range(key.as_bytes(), start, end).await?;
        debug!(key, start, end, count = items.len(), "list_range");
        Ok(items)
    }

    /// [`list_range`](Self::list_range) with elements read as UTF-8 text.
    /// Invalid sequences are replaced.
    pub async fn list_range_strings(
        &self,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<String>> {
        let items = self.list_range(key, start, end).await?;
        Ok(items
            .into_iter()
            .map(|item| String::from_utf8_lossy(&item).into_owned())
            .collect())
    }

    /// Remove occurrences of `value`: all when `count == 0`, up to `count`
    /// from the head when positive, up to `|count|` from the tail when
    /// negative. Returns how many were removed.
    pub async fn list_remove(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
        count: i64,
    ) -> Result<usize> {
        let removed = self
            .cache
            .l_rem(key.as_bytes(), count, value.as_ref())
            .await?;
        debug!(key, count, removed, "list_remove");
        Ok(removed)
    }

    // ── Key management ──────────────────────────────────────────────────

    /// Whether `key` exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let exists = self.cache.exists(key.as_bytes()).await?;
        debug!(key, exists, "exists");
        Ok(exists)
    }

    /// Remaining lifetime of `key`.
    pub async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let ttl = self.cache.ttl(key.as_bytes()).await?;
        debug!(key, ttl = ttl.as_secs(), "ttl");
        Ok(ttl)
    }

    /// Set a timeout on `key`; zero deletes it. Returns `false` if the key
    /// does not exist.
    pub async fn expire(&self, key: &str, secs: u64) -> Result<bool> {
        let applied = self.cache.expire(key.as_bytes(), secs).await?;
        debug!(key, secs, applied, "expire");
        Ok(applied)
    }

    /// Remove `key`. Returns the number of keys removed.
    pub async fn delete(&self, key: &str) -> Result<usize> {
        let removed = self.cache.del(key.as_bytes()).await?;
        debug!(key, removed, "delete");
        Ok(removed)
    }

    // ── Values ──────────────────────────────────────────────────────────

    /// Store an encoded value with an expiry.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<()> {
        require_ttl(ttl_secs)?;
        let bytes = self.codec.encode(value)?;
        self.cache.set_ex(key.as_bytes(), ttl_secs, &bytes).await?;
        debug!(key, ttl_secs, "put");
        Ok(())
    }

    /// [`put`](Self::put) with a one-hour expiry.
    pub async fn put_default<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.put(key, value, DEFAULT_TTL_SECS).await
    }

    /// Fetch and decode a value. Missing or empty entries yield `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let bytes = self.cache.get(key.as_bytes()).await?;
        debug!(key, hit = bytes.is_some(), "get");
        match bytes {
            Some(bytes) => Ok(decode_optional(&self.codec, &bytes)?),
            None => Ok(None),
        }
    }

    // ── Hashes ──────────────────────────────────────────────────────────

    /// Store an encoded value in a hash field. Returns `true` if the field is new.
    pub async fn hash_put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &T,
    ) -> Result<bool> {
        let bytes = self.codec.encode(value)?;
        let created = self
            .cache
            .h_set(key.as_bytes(), field.as_bytes(), &bytes)
            .await?;
        debug!(key, field, created, "hash_put");
        Ok(created)
    }

    /// Fetch and decode a hash field.
    pub async fn hash_get<T: DeserializeOwned>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>> {
        let bytes = self.cache.h_get(key.as_bytes(), field.as_bytes()).await?;
        debug!(key, field, hit = bytes.is_some(), "hash_get");
        match bytes {
            Some(bytes) => Ok(decode_optional(&self.codec, &bytes)?),
            None => Ok(None),
        }
    }

    /// Remove a hash field. Returns `true` if it existed.
    pub async fn hash_remove(&self, key: &str, field: &str) -> Result<bool> {
        let removed = self.cache.h_del(key.as_bytes(), field.as_bytes()).await?;
        debug!(key, field, removed, "hash_remove");
        Ok(removed)
    }

    // ── Raw access ──────────────────────────────────────────────────────

    /// Fetch raw bytes.
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let bytes = self.cache.get(key.as_bytes()).await?;
        debug!(key, hit = bytes.is_some(), "get_bytes");
        Ok(bytes)
    }

    /// Store raw bytes; a zero TTL stores without expiry.
    pub async fn set_bytes(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        if ttl_secs == 0 {
            self.cache.set(key.as_bytes(), value).await?;
        } else {
            self.cache.set_ex(key.as_bytes(), ttl_secs, value).await?;
        }
        debug!(key, len = value.len(), ttl_secs, "set_bytes");
        Ok(())
    }

    // ── Administration ──────────────────────────────────────────────────

    /// Keys matching a glob-style pattern, as text.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys = self.cache.keys(pattern).await?;
        debug!(pattern, count = keys.len(), "keys");
        Ok(keys
            .into_iter()
            .map(|k| String::from_utf8_lossy(&k).into_owned())
            .collect())
    }

    /// Remove every key in the cache.
    pub async fn flush(&self) -> Result<()> {
        self.cache.flush_all().await?;
        debug!("flush");
        Ok(())
    }

    /// Number of live keys in the cache.
    pub async fn size(&self) -> Result<usize> {
        let size = self.cache.db_size().await?;
        debug!(size, "size");
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use kvsession_cache::{CacheError, MemoryCache};
    use serde::Deserialize;

    fn ops() -> CacheOps {
        CacheOps::new(Arc::new(MemoryCache::new()))
    }

    /// Memory cache whose `SETNX` and `EXPIRE` fail, so only a single
    /// `SET NX EX` can store a lock.
    struct NoSplitSetNx(MemoryCache);

    fn refused<T>(command: &str) -> kvsession_cache::Result<T> {
        Err(CacheError::Backend(format!("{command} refused")))
    }

    #[async_trait]
    impl CacheClient for NoSplitSetNx {
        async fn get(&self, key: &[u8]) -> kvsession_cache::Result<Option<Vec<u8>>> {
            self.0.get(key).await
        }
        async fn set(&self, key: &[u8], value: &[u8]) -> kvsession_cache::Result<()> {
            self.0.set(key, value).await
        }
        async fn set_ex(&self, key: &[u8], secs: u64, value: &[u8]) -> kvsession_cache::Result<()> {
            self.0.set_ex(key, secs, value).await
        }
        async fn set_nx(&self, _: &[u8], _: &[u8]) -> kvsession_cache::Result<bool> {
            refused("SETNX")
        }
        async fn set_nx_ex(
            &self,
            key: &[u8],
            secs: u64,
            value: &[u8],
        ) -> kvsession_cache::Result<bool> {
            self.0.set_nx_ex(key, secs, value).await
        }
        async fn del(&self, key: &[u8]) -> kvsession_cache::Result<usize> {
            self.0.del(key).await
        }
        async fn exists(&self, key: &[u8]) -> kvsession_cache::Result<bool> {
            self.0.exists(key).await
        }
        async fn expire(&self, _: &[u8], _: u64) -> kvsession_cache::Result<bool> {
            refused("EXPIRE")
        }
        async fn ttl(&self, key: &[u8]) -> kvsession_cache::Result<KeyTtl> {
            self.0.ttl(key).await
        }
        async fn keys(&self, pattern: &str) -> kvsession_cache::Result<Vec<Vec<u8>>> {
            self.0.keys(pattern).await
        }
        async fn incr_by(&self, key: &[u8], delta: i64) -> kvsession_cache::Result<i64> {
            self.0.incr_by(key, delta).await
        }
        async fn incr_by_float(&self, key: &[u8], delta: f64) -> kvsession_cache::Result<f64> {
            self.0.incr_by_float(key, delta).await
        }
        async fn h_set(&self, key: &[u8], f: &[u8], v: &[u8]) -> kvsession_cache::Result<bool> {
            self.0.h_set(key, f, v).await
        }
        async fn h_get(&self, key: &[u8], f: &[u8]) -> kvsession_cache::Result<Option<Vec<u8>>> {
            self.0.h_get(key, f).await
        }
        async fn h_del(&self, key: &[u8], f: &[u8]) -> kvsession_cache::Result<bool> {
            self.0.h_del(key, f).await
        }
        async fn r_push(&self, key: &[u8], values: &[Vec<u8>]) -> kvsession_cache::Result<usize> {
            self.0.r_push(key, values).await
        }
        async fn l_range(
            &self,
            key: &[u8],
            start: i64,
            stop: i64,
        ) -> kvsession_cache::Result<Vec<Vec<u8>>> {
            self.0.l_range(key, start, stop).await
        }
        async fn l_rem(&self, key: &[u8], count: i64, v: &[u8]) -> kvsession_cache::Result<usize> {
            self.0.l_rem(key, count, v).await
        }
        async fn flush_all(&self) -> kvsession_cache::Result<()> {
            self.0.flush_all().await
        }
        async fn db_size(&self) -> kvsession_cache::Result<usize> {
            self.0.db_size().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_keeps_ttl() {
        let ops = ops();

        assert!(ops.set_if_absent("lock", "owner-a", 60, false).await.unwrap());
        tokio::time::advance(Duration::from_secs(20)).await;

        assert!(!ops.set_if_absent("lock", "owner-b", 60, false).await.unwrap());
        assert_eq!(ops.ttl("lock").await.unwrap().as_secs(), 40);
        assert_eq!(ops.get::<String>("lock").await.unwrap().as_deref(), Some("owner-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_refreshes_ttl() {
        let ops = ops();

        assert!(ops.set_if_absent("lock", "owner-a", 60, true).await.unwrap());
        tokio::time::advance(Duration::from_secs(20)).await;

        assert!(!ops.set_if_absent("lock", "owner-b", 60, true).await.unwrap());
        assert_eq!(ops.ttl("lock").await.unwrap().as_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_stores_value_and_ttl_together() {
        let ops = CacheOps::new(Arc::new(NoSplitSetNx(MemoryCache::new())));

        assert!(ops.set_if_absent("lock", "owner-a", 30, false).await.unwrap());
        assert_eq!(ops.ttl("lock").await.unwrap().as_secs(), 30);
        assert!(!ops.set_if_absent("lock", "owner-b", 30, false).await.unwrap());

        // Refreshing an existing key is the one path that issues EXPIRE
        let err = ops.set_if_absent("lock", "owner-b", 30, true).await.unwrap_err();
        assert!(matches!(err, StoreError::Cache(CacheError::Backend(_))));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!ops.exists("lock").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_if_absent_default() {
        let ops = ops();
        assert!(ops.set_if_absent_default("k", &1).await.unwrap());
        assert_eq!(ops.ttl("k").await.unwrap().as_secs(), 3600);
    }

    #[tokio::test]
    async fn test_set_if_absent_zero_ttl_rejected() {
        let ops = ops();
        let err = ops.set_if_absent("k", &1, 0, false).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert!(!ops.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_counters() {
        let ops = ops();
        assert_eq!(ops.increment("hits", 5).await.unwrap(), 5);
        assert_eq!(ops.decrement("hits", 5).await.unwrap(), 0);
        assert_eq!(ops.incr("hits").await.unwrap(), 1);
        assert_eq!(ops.decr("hits").await.unwrap(), 0);
        assert_eq!(ops.decr("hits").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_decrement_min_rejected() {
        let ops = ops();
        let err = ops.decrement("k", i64::MIN).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_increment_non_integer() {
        let ops = ops();
        ops.set_bytes("name", b"alice", 0).await.unwrap();
        let err = ops.increment("name", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Cache(CacheError::NotAnInteger)));
    }

    #[tokio::test]
    async fn test_increment_float() {
        let ops = ops();
        assert_eq!(ops.increment_float("score", 1.5).await.unwrap(), 1.5);
        assert_eq!(ops.increment_float("score", 0.25).await.unwrap(), 1.75);
    }

    #[tokio::test]
    async fn test_list_remove_from_tail() {
        let ops = ops();
        assert_eq!(ops.list_append("q", &["x", "y", "x"]).await.unwrap(), 3);

        assert_eq!(ops.list_remove("q", "x", -1).await.unwrap(), 1);
        assert_eq!(ops.list_range_strings("q", 0, -1).await.unwrap(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_list_remove_all() {
        let ops = ops();
        ops.list_append("q", &["a", "b", "a", "a"]).await.unwrap();

        assert_eq!(ops.list_remove("q", "a", 0).await.unwrap(), 3);
        assert_eq!(ops.list_range("q", 0, -1).await.unwrap(), vec![b"b".to_vec()]);
    }

    #[tokio::test]
    async fn test_list_range_bounds() {
        let ops = ops();
        ops.list_append("q", &["a", "b", "c", "d"]).await.unwrap();

        assert_eq!(ops.list_range_strings("q", 1, 2).await.unwrap(), vec!["b", "c"]);
        assert_eq!(ops.list_range_strings("q", -2, -1).await.unwrap(), vec!["c", "d"]);
        assert!(ops.list_range("q", 5, 10).await.unwrap().is_empty());
        assert!(ops.list_range("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_append_empty_rejected() {
        let ops = ops();
        let none: [&str; 0] = [];
        let err = ops.list_append("q", &none).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_get_expiry() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Token {
            user: String,
            scopes: Vec<String>,
        }

        let ops = ops();
        let token = Token {
            user: "alice".to_string(),
            scopes: vec!["read".to_string()],
        };
        ops.put("token:1", &token, 5).await.unwrap();
        assert_eq!(ops.get::<Token>("token:1").await.unwrap(), Some(token));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(ops.get::<Token>("token:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_empty_value_is_none() {
        let ops = ops();
        ops.set_bytes("blank", b"", 0).await.unwrap();
        assert_eq!(ops.get::<String>("blank").await.unwrap(), None);
        assert_eq!(ops.get_bytes("blank").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_hash_ops() {
        let ops = ops();
        assert!(ops.hash_put("user:1", "name", "alice").await.unwrap());
        assert!(!ops.hash_put("user:1", "name", "bob").await.unwrap());

        assert_eq!(
            ops.hash_get::<String>("user:1", "name").await.unwrap().as_deref(),
            Some("bob")
        );
        assert!(ops.hash_remove("user:1", "name").await.unwrap());
        assert!(!ops.exists("user:1").await.unwrap());
        assert_eq!(ops.hash_get::<String>("user:1", "name").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_key_management() {
        let ops = ops();
        ops.set_bytes("a:1", b"x", 0).await.unwrap();
        ops.set_bytes("a:2", b"y", 30).await.unwrap();
        ops.set_bytes("b:1", b"z", 0).await.unwrap();

        assert_eq!(ops.ttl("a:1").await.unwrap(), KeyTtl::Persistent);
        assert!(ops.expire("a:1", 10).await.unwrap());
        assert!(!ops.expire("missing", 10).await.unwrap());

        let mut keys = ops.keys("a:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a:1", "a:2"]);
        assert_eq!(ops.size().await.unwrap(), 3);

        assert_eq!(ops.delete("b:1").await.unwrap(), 1);
        assert_eq!(ops.ttl("b:1").await.unwrap(), KeyTtl::Missing);

        ops.flush().await.unwrap();
        assert_eq!(ops.size().await.unwrap(), 0);
    }
}
