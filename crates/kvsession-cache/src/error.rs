//! Error types for cache client operations.

/// Error type for cache client operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The stored value cannot be interpreted as a 64-bit integer.
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The stored value cannot be interpreted as a float.
    #[error("value is not a valid float")]
    NotAFloat,

    /// Increment or decrement would overflow.
    #[error("increment or decrement would overflow")]
    Overflow,

    /// The key holds a value of a different kind than the command expects.
    #[error("operation against a key holding the wrong kind of value")]
    WrongType,

    /// Expiry must be a positive number of seconds.
    #[error("invalid expire time: {0}")]
    InvalidExpire(u64),

    /// Key scan pattern could not be parsed.
    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Generic backend failure (connection, protocol, server error).
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Error reported by the Redis client.
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Result type for cache client operations.
pub type Result<T> = std::result::Result<T, CacheError>;
