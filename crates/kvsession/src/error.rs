//! Error types for session store, codec, and primitive operations.

use kvsession_cache::CacheError;
use kvsession_config::ConfigError;

/// Error type for payload encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload cannot be represented by the codec. Raised before any
    /// bytes are written.
    #[error("{type_name} is not serializable: {reason}")]
    NotSerializable {
        type_name: &'static str,
        reason: String,
    },

    /// The bytes do not decode into the requested type.
    #[error("corrupt {type_name} payload: {reason}")]
    Corrupt {
        type_name: &'static str,
        reason: String,
    },
}

/// Error type for session store and primitive operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Missing session, missing or blank id, or an argument the operation
    /// cannot act on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Encoding or decoding failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The cache round-trip failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The requested cache backend was not compiled in.
    #[error("Cache backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Result type for session store and primitive operations.
pub type Result<T> = std::result::Result<T, StoreError>;
