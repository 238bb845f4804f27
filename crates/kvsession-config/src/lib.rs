//! Configuration system for the kvsession session store.
//!
//! Provides TOML-based configuration with:
//! - `[session]`: key namespace, expiry, and delete policy for the session store
//! - `[cache]`: which cache backend to connect to
//! - Loading and validating a config file from a path
//!
//! ```toml
//! [session]
//! key_prefix = "shiro_redis_session:"
//! expire = 3600
//! delete_policy = "retain"
//!
//! [cache]
//! backend = "redis"
//! url = "redis://127.0.0.1:6379"
//! ```

pub mod error;
pub mod loader;
pub mod types;

pub use error::{ConfigError, Result};
pub use loader::load_config_file;
pub use types::*;
