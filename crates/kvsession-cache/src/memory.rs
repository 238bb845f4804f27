//! In-process cache backend.
//!
//! Mirrors the Redis semantics the rest of the workspace relies on: lazy
//! expiry on access, `INCR` keeping the key's TTL, `SET` clearing it, empty
//! hashes and lists disappearing, and wrong-type errors when a command hits a
//! key holding a different kind of value.
//!
//! Expiry runs on [`tokio::time::Instant`], so tests can pause the runtime
//! clock and advance it instead of sleeping. Expired keys are dropped when
//! touched; keys nobody touches again are reclaimed by
//! [`MemoryCache::purge_expired`] or the background sweeper started with
//! [`MemoryCache::start_expiry_sweeper`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use glob::Pattern;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::client::{CacheClient, KeyTtl};
use crate::error::{CacheError, Result};

/// A stored value.
#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
}

/// A value plus its optional deadline.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Inner state protected by a mutex.
#[derive(Debug, Default)]
struct Store {
    entries: HashMap<Vec<u8>, Entry>,
}

impl Store {
    /// Look up a key, dropping it first if its deadline has passed.
    fn live(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            trace!(key = %String::from_utf8_lossy(key), "Key expired");
            self.entries.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    /// Drop every expired entry. Returns how many were dropped.
    fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before - self.entries.len()
    }

    /// Overwrite a plain value while keeping whatever TTL the key had.
    fn put_keeping_ttl(&mut self, key: &[u8], bytes: Vec<u8>) {
        match self.entries.get_mut(key) {
            Some(entry) => entry.value = Value::Bytes(bytes),
            None => {
                self.entries
                    .insert(key.to_vec(), Entry::new(Value::Bytes(bytes)));
            }
        }
    }
}

/// In-memory [`CacheClient`].
///
/// Every call takes a single lock, so each command is atomic with respect to
/// concurrent callers. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<Store>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry now. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let purged = self.inner.lock().purge_expired();
        if purged > 0 {
            debug!(count = purged, "Purged expired keys");
        }
        purged
    }

    /// Spawn a task that calls [`purge_expired`](Self::purge_expired) every
    /// `period` (at least one millisecond).
    ///
    /// The task holds only a weak reference and exits once every clone of
    /// the cache is dropped. Must be called from within a tokio runtime.
    pub fn start_expiry_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(&self.inner);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    trace!("Cache dropped, stopping expiry sweeper");
                    break;
                };
                let purged = store.lock().purge_expired();
                if purged > 0 {
                    debug!(count = purged, "Swept expired keys");
                }
            }
        })
    }
}

/// Deadline `seconds` from now; `None` when it is beyond the clock's range.
fn deadline(seconds: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(seconds))
}

fn parse_integer(bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CacheError::NotAnInteger)
}

fn parse_float(bytes: &[u8]) -> Result<f64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .ok_or(CacheError::NotAFloat)
}

/// Resolve Redis-style inclusive indices against a list length.
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn remove_matches(list: &mut VecDeque<Vec<u8>>, count: i64, value: &[u8]) -> usize {
    let limit = if count == 0 {
        usize::MAX
    } else {
        count.unsigned_abs() as usize
    };
    let mut removed = 0;

    if count >= 0 {
        let mut i = 0;
        while i < list.len() && removed < limit {
            if list[i].as_slice() == value {
                list.remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
    } else {
        let mut i = list.len();
        while i > 0 && removed < limit {
            i -= 1;
            if list[i].as_slice() == value {
                list.remove(i);
                removed += 1;
            }
        }
    }

    removed
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut store = self.inner.lock();
        match store.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(CacheError::WrongType),
        }
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut store = self.inner.lock();
        store
            .entries
            .insert(key.to_vec(), Entry::new(Value::Bytes(value.to_vec())));
        Ok(())
    }

    async fn set_ex(&self, key: &[u8], seconds: u64, value: &[u8]) -> Result<()> {
        if seconds == 0 {
            return Err(CacheError::InvalidExpire(seconds));
        }
        let mut store = self.inner.lock();
        store.entries.insert(
            key.to_vec(),
            Entry {
                value: Value::Bytes(value.to_vec()),
                expires_at: deadline(seconds),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let mut store = self.inner.lock();
        if store.live(key).is_some() {
            return Ok(false);
        }
        store
            .entries
            .insert(key.to_vec(), Entry::new(Value::Bytes(value.to_vec())));
        Ok(true)
    }

    async fn set_nx_ex(&self, key: &[u8], seconds: u64, value: &[u8]) -> Result<bool> {
        if seconds == 0 {
            return Err(CacheError::InvalidExpire(seconds));
        }
        let mut store = self.inner.lock();
        if store.live(key).is_some() {
            return Ok(false);
        }
        store.entries.insert(
            key.to_vec(),
            Entry {
                value: Value::Bytes(value.to_vec()),
                expires_at: deadline(seconds),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &[u8]) -> Result<usize> {
        let mut store = self.inner.lock();
        let existed = store.live(key).is_some();
        if existed {
            store.entries.remove(key);
        }
        Ok(usize::from(existed))
    }

    async fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.inner.lock().live(key).is_some())
    }

    async fn expire(&self, key: &[u8], seconds: u64) -> Result<bool> {
        let mut store = self.inner.lock();
        if seconds == 0 {
            let existed = store.live(key).is_some();
            if existed {
                store.entries.remove(key);
            }
            return Ok(existed);
        }
        match store.live(key) {
            Some(entry) => {
                entry.expires_at = deadline(seconds);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &[u8]) -> Result<KeyTtl> {
        let mut store = self.inner.lock();
        let ttl = match store.live(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(Instant::now())),
        };
        Ok(ttl)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<Vec<u8>>> {
        let matcher = Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let mut store = self.inner.lock();
        store.purge_expired();
        let keys: Vec<Vec<u8>> = store
            .entries
            .keys()
            .filter(|k| matcher.matches(&String::from_utf8_lossy(k)))
            .cloned()
            .collect();

        trace!(pattern = %pattern, matched = keys.len(), "Key scan");
        Ok(keys)
    }

    async fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64> {
        let mut store = self.inner.lock();
        let current = match store.live(key) {
            None => 0,
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => parse_integer(bytes)?,
            Some(_) => return Err(CacheError::WrongType),
        };
        let next = current.checked_add(delta).ok_or(CacheError::Overflow)?;
        store.put_keeping_ttl(key, next.to_string().into_bytes());
        Ok(next)
    }

    async fn incr_by_float(&self, key: &[u8], delta: f64) -> Result<f64> {
        let mut store = self.inner.lock();
        let current = match store.live(key) {
            None => 0.0,
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => parse_float(bytes)?,
            Some(_) => return Err(CacheError::WrongType),
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err(CacheError::NotAFloat);
        }
        store.put_keeping_ttl(key, next.to_string().into_bytes());
        Ok(next)
    }

    async fn h_set(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        let mut store = self.inner.lock();
        match store.live(key) {
            None => {
                let mut hash = HashMap::new();
                hash.insert(field.to_vec(), value.to_vec());
                store.entries.insert(key.to_vec(), Entry::new(Value::Hash(hash)));
                Ok(true)
            }
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.insert(field.to_vec(), value.to_vec()).is_none()),
            Some(_) => Err(CacheError::WrongType),
        }
    }

    async fn h_get(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut store = self.inner.lock();
        match store.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.get(field).cloned()),
            Some(_) => Err(CacheError::WrongType),
        }
    }

    async fn h_del(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        let mut store = self.inner.lock();
        let (removed, now_empty) = match store.live(key) {
            None => return Ok(false),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => (hash.remove(field).is_some(), hash.is_empty()),
            Some(_) => return Err(CacheError::WrongType),
        };
        if now_empty {
            store.entries.remove(key);
        }
        Ok(removed)
    }

    async fn r_push(&self, key: &[u8], values: &[Vec<u8>]) -> Result<usize> {
        let mut store = self.inner.lock();
        match store.live(key) {
            None => {
                let list: VecDeque<Vec<u8>> = values.iter().cloned().collect();
                let len = list.len();
                if len > 0 {
                    store.entries.insert(key.to_vec(), Entry::new(Value::List(list)));
                }
                Ok(len)
            }
            Some(Entry {
                value: Value::List(list),
                ..
            }) => {
                list.extend(values.iter().cloned());
                Ok(list.len())
            }
            Some(_) => Err(CacheError::WrongType),
        }
    }

    async fn l_range(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let mut store = self.inner.lock();
        match store.live(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(match normalize_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(CacheError::WrongType),
        }
    }

    async fn l_rem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<usize> {
        let mut store = self.inner.lock();
        let (removed, now_empty) = match store.live(key) {
            None => return Ok(0),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => {
                let removed = remove_matches(list, count, value);
                (removed, list.is_empty())
            }
            Some(_) => return Err(CacheError::WrongType),
        };
        if now_empty {
            store.entries.remove(key);
        }
        Ok(removed)
    }

    async fn flush_all(&self) -> Result<()> {
        self.inner.lock().entries.clear();
        Ok(())
    }

    async fn db_size(&self) -> Result<usize> {
        let mut store = self.inner.lock();
        store.purge_expired();
        Ok(store.entries.len())
    }
}
