//! Session persistence over a remote key-value cache.
//!
//! This crate stores opaque, serializable session objects under namespaced
//! cache keys with a TTL that is refreshed on every write, enumerates live
//! sessions by scanning the namespace, and exposes the atomic primitives
//! (conditional set, counters, lists) that locks, counters, and queues are
//! built from.
//!
//! # Architecture
//!
//! ```text
//! SessionStore ──> Codec ──> CacheClient
//! CacheOps ─────────────────> CacheClient
//! ```
//!
//! The cache client is injected as an `Arc<dyn CacheClient>`; nothing here
//! holds global state.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kvsession::{MemoryCache, SessionStore, SimpleSession, StoreConfig};
//!
//! let cache = Arc::new(MemoryCache::new());
//! let store = SessionStore::<SimpleSession>::new(cache, StoreConfig::default())?;
//!
//! let mut session = SimpleSession::new();
//! session.set_attribute("user", &"alice")?;
//! let id = store.create(&mut session).await?;
//!
//! let loaded = store.read_session(&id).await;
//! ```

mod backend;
mod codec;
mod config;
mod error;
mod primitives;
mod session;
mod store;

pub use backend::open_cache;
pub use codec::{Codec, JsonCodec, decode_lossy, decode_optional, encode_optional};
pub use config::StoreConfig;
pub use error::{CodecError, Result, StoreError};
pub use primitives::{CacheOps, DEFAULT_TTL_SECS};
pub use session::{Session, SessionId, SessionIdGenerator, SimpleSession, UuidGenerator};
pub use store::{ReadOutcome, SessionStore};

pub use kvsession_cache::{CacheClient, CacheError, KeyTtl, MemoryCache};
#[cfg(feature = "redis")]
pub use kvsession_cache::RedisCache;
pub use kvsession_config::DeletePolicy;
