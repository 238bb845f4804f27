//! Session store configuration.

use kvsession_config::{
    ConfigError, DEFAULT_EXPIRE_SECS, DEFAULT_KEY_PREFIX, DeletePolicy, SessionConfig,
};

/// Runtime settings for a [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Prepended to session ids to form cache keys.
    pub key_prefix: String,
    /// Entry lifetime in seconds, reapplied on every save.
    pub expire_secs: u64,
    /// What `delete` does.
    pub delete_policy: DeletePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            expire_secs: DEFAULT_EXPIRE_SECS,
            delete_policy: DeletePolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the entry lifetime in seconds.
    pub fn with_expire_secs(mut self, secs: u64) -> Self {
        self.expire_secs = secs;
        self
    }

    /// Set the delete policy.
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Apply the same checks as the `[session]` config section: a non-empty
    /// prefix free of key-pattern wildcards, and a non-zero expiry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SessionConfig {
            key_prefix: self.key_prefix.clone(),
            expire: self.expire_secs,
            delete_policy: self.delete_policy,
        }
        .validate()
    }

    /// In-memory session timeout matching the entry lifetime.
    pub fn timeout_millis(&self) -> u64 {
        self.expire_secs.saturating_mul(1000)
    }
}

impl From<&SessionConfig> for StoreConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            key_prefix: config.key_prefix.clone(),
            expire_secs: config.expire,
            delete_policy: config.delete_policy,
        }
    }
}

impl From<SessionConfig> for StoreConfig {
    fn from(config: SessionConfig) -> Self {
        Self {
            key_prefix: config.key_prefix,
            expire_secs: config.expire,
            delete_policy: config.delete_policy,
        }
    }
}
