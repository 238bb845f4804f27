//! Cache backend selection from configuration.

use std::sync::Arc;
use std::time::Duration;

use kvsession_cache::{CacheClient, MemoryCache};
use kvsession_config::{CacheBackend, CacheConfig};
use tracing::info;

use crate::error::Result;

/// How often the in-memory backend reclaims expired keys.
const MEMORY_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Build the cache client described by `config`.
///
/// The in-memory backend gets a background expiry sweeper that stops once
/// the returned client is dropped.
///
/// # Errors
///
/// Returns [`StoreError::Config`](crate::StoreError::Config) for an invalid
/// section, [`StoreError::BackendUnavailable`](crate::StoreError::BackendUnavailable)
/// when the backend was not compiled in, and the connection error otherwise.
pub async fn open_cache(config: &CacheConfig) -> Result<Arc<dyn CacheClient>> {
    config.validate()?;

    match config.backend {
        CacheBackend::Memory => {
            let cache = MemoryCache::new();
            cache.start_expiry_sweeper(MEMORY_SWEEP_PERIOD);
            info!("Using in-memory cache");
            Ok(Arc::new(cache))
        }
        CacheBackend::Redis => connect_redis(config.url.as_deref().unwrap_or_default()).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str) -> Result<Arc<dyn CacheClient>> {
    let cache = kvsession_cache::RedisCache::connect(url).await?;
    info!("Using Redis cache");
    Ok(Arc::new(cache))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_url: &str) -> Result<Arc<dyn CacheClient>> {
    Err(crate::error::StoreError::BackendUnavailable(
        "redis support not compiled in (enable the `redis` feature)".to_string(),
    ))
}
