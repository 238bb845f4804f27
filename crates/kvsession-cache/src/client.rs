//! The cache client contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Remaining lifetime of a key, as reported by [`CacheClient::ttl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists and has no expiry.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Interpret a Redis `TTL` reply (-2 missing, -1 persistent, else seconds).
    pub fn from_redis_secs(secs: i64) -> Self {
        match secs {
            -2 => Self::Missing,
            s if s < 0 => Self::Persistent,
            s => Self::Expires(Duration::from_secs(s as u64)),
        }
    }

    /// Redis-style seconds: -2 missing, -1 persistent, otherwise whole
    /// seconds remaining (rounded to nearest).
    pub fn as_secs(&self) -> i64 {
        match self {
            Self::Missing => -2,
            Self::Persistent => -1,
            Self::Expires(remaining) => {
                let millis = i64::try_from(remaining.as_millis()).unwrap_or(i64::MAX);
                millis.saturating_add(500) / 1000
            }
        }
    }

    /// Remaining lifetime, if the key expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Expires(remaining) => Some(*remaining),
            _ => None,
        }
    }

    /// Whether the key exists.
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Primitive operations against a remote byte-oriented key-value store.
///
/// Keys and values are byte strings. Every method is one round-trip and is
/// atomic with respect to other callers on the same key; implementations
/// must not add cross-call coordination of their own.
///
/// # Thread Safety
///
/// Implementations are shared as `Arc<dyn CacheClient>` between the session
/// store and the primitive helpers, so they must be `Send + Sync`.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetch the value at `key`. Returns `Ok(None)` if the key is absent.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` at `key` with no expiry, discarding any previous TTL.
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Store `value` at `key`, expiring after `seconds`.
    async fn set_ex(&self, key: &[u8], seconds: u64, value: &[u8]) -> Result<()>;

    /// Store `value` only if `key` does not exist. Returns `true` if stored.
    async fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool>;

    /// Store `value` with an expiry of `seconds`, only if `key` does not
    /// exist. Value and expiry are written in one command. Returns `true` if
    /// stored.
    async fn set_nx_ex(&self, key: &[u8], seconds: u64, value: &[u8]) -> Result<bool>;

    /// Remove `key`. Returns the number of keys removed.
    async fn del(&self, key: &[u8]) -> Result<usize>;

    /// Whether `key` exists.
    async fn exists(&self, key: &[u8]) -> Result<bool>;

    /// Set a timeout on `key`. Returns `false` if the key does not exist.
    ///
    /// A timeout of zero deletes the key.
    async fn expire(&self, key: &[u8], seconds: u64) -> Result<bool>;

    /// Remaining lifetime of `key`.
    async fn ttl(&self, key: &[u8]) -> Result<KeyTtl>;

    /// All keys matching a glob-style `pattern` (`*`, `?`, `[...]`).
    ///
    /// The returned keys are distinct; order is unspecified.
    async fn keys(&self, pattern: &str) -> Result<Vec<Vec<u8>>>;

    /// Add `delta` to the integer at `key` (missing keys start at 0).
    async fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64>;

    /// Add `delta` to the float at `key` (missing keys start at 0).
    async fn incr_by_float(&self, key: &[u8], delta: f64) -> Result<f64>;

    /// Set `field` in the hash at `key`. Returns `true` if the field is new.
    async fn h_set(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool>;

    /// Fetch `field` from the hash at `key`.
    async fn h_get(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Remove `field` from the hash at `key`. Returns `true` if it existed.
    async fn h_del(&self, key: &[u8], field: &[u8]) -> Result<bool>;

    /// Append `values` to the tail of the list at `key`. Returns the new length.
    async fn r_push(&self, key: &[u8], values: &[Vec<u8>]) -> Result<usize>;

    /// Elements `start..=stop` of the list at `key`; negative indices count
    /// from the tail (-1 is the last element).
    async fn l_range(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>>;

    /// Remove occurrences of `value` from the list at `key`.
    ///
    /// `count == 0` removes all, `count > 0` up to `count` from the head,
    /// `count < 0` up to `|count|` from the tail. Returns the number removed.
    async fn l_rem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<usize>;

    /// Remove every key.
    async fn flush_all(&self) -> Result<()>;

    /// Number of live keys.
    async fn db_size(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_redis_secs() {
        assert_eq!(KeyTtl::from_redis_secs(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::from_redis_secs(-1), KeyTtl::Persistent);
        assert_eq!(
            KeyTtl::from_redis_secs(10),
            KeyTtl::Expires(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_ttl_as_secs_rounds() {
        assert_eq!(KeyTtl::Missing.as_secs(), -2);
        assert_eq!(KeyTtl::Persistent.as_secs(), -1);
        assert_eq!(KeyTtl::Expires(Duration::from_millis(9_600)).as_secs(), 10);
        assert_eq!(KeyTtl::Expires(Duration::from_millis(9_400)).as_secs(), 9);
    }

    #[test]
    fn test_ttl_as_secs_saturates() {
        assert_eq!(KeyTtl::Expires(Duration::MAX).as_secs(), i64::MAX / 1000);
    }

    #[test]
    fn test_ttl_remaining() {
        assert!(!KeyTtl::Missing.exists());
        assert!(KeyTtl::Persistent.exists());
        assert_eq!(KeyTtl::Persistent.remaining(), None);
        assert_eq!(
            KeyTtl::Expires(Duration::from_secs(3)).remaining(),
            Some(Duration::from_secs(3))
        );
    }
}
