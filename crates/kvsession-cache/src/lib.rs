//! Key-value cache client contract.
//!
//! Everything above this crate talks to the cache through [`CacheClient`], a
//! byte-oriented command set modelled on Redis: plain values with optional
//! expiry, conditional set, integer and float counters, hashes, lists, and
//! glob-pattern key scans.
//!
//! Two backends are provided:
//! - [`MemoryCache`]: in-process, with lazy TTL expiry on the tokio clock
//! - `RedisCache` (feature `redis`): a thin adapter over a Redis connection manager
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kvsession_cache::{CacheClient, MemoryCache};
//!
//! let cache: Arc<dyn CacheClient> = Arc::new(MemoryCache::new());
//! cache.set_ex(b"greeting", 60, b"hello").await?;
//! ```

mod client;
mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis_cache;

pub use client::{CacheClient, KeyTtl};
pub use error::{CacheError, Result};
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
