//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]   # session store namespace and expiry
//! [cache]     # cache backend selection
//! ```

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional; an absent section reads as its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvSessionConfig {
    /// Session store configuration.
    pub session: Option<SessionConfig>,

    /// Cache backend configuration.
    pub cache: Option<CacheConfig>,
}

impl KvSessionConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Session settings, falling back to defaults when the section is absent.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Cache settings, falling back to defaults when the section is absent.
    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    /// Check every present section for unusable values.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref session) = self.session {
            session.validate()?;
        }
        if let Some(ref cache) = self.cache {
            cache.validate()?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default key namespace for session entries.
pub const DEFAULT_KEY_PREFIX: &str = "shiro_redis_session:";

/// Default session expiry in seconds (one hour).
pub const DEFAULT_EXPIRE_SECS: u64 = 60 * 60;

/// Characters with special meaning in key scan patterns. The prefix is used
/// verbatim as the head of the scan pattern, so it must avoid them.
const GLOB_METACHARACTERS: &[char] = &['*', '?', '[', ']'];

/// What `delete` does to a session's cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Validate the session but leave its entry in place; it disappears when
    /// its TTL runs out.
    #[default]
    Retain,
    /// Remove the entry immediately.
    Evict,
}

/// Session store configuration.
///
/// ```toml
/// [session]
/// key_prefix = "shiro_redis_session:"
/// expire = 3600
/// delete_policy = "retain"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Namespace prepended to session ids to form cache keys and the scan pattern.
    pub key_prefix: String,
    /// Expiry in seconds, reapplied on every save.
    pub expire: u64,
    /// Behavior of session deletion.
    pub delete_policy: DeletePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            expire: DEFAULT_EXPIRE_SECS,
            delete_policy: DeletePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Reject an empty or wildcard-bearing prefix and a zero expiry.
    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "session.key_prefix".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.key_prefix.contains(GLOB_METACHARACTERS) {
            return Err(ConfigError::Invalid {
                field: "session.key_prefix".to_string(),
                reason: format!("must not contain any of {GLOB_METACHARACTERS:?}"),
            });
        }
        if self.expire == 0 {
            return Err(ConfigError::Invalid {
                field: "session.expire".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Supported cache backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process cache; contents are lost when the process exits.
    #[default]
    Memory,
    /// Remote Redis server.
    Redis,
}

/// Cache backend configuration.
///
/// ```toml
/// [cache]
/// backend = "redis"
/// url = "redis://127.0.0.1:6379"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Which backend to use.
    pub backend: CacheBackend,
    /// Connection URL (required for `redis`).
    pub url: Option<String>,
}

impl CacheConfig {
    /// A Redis backend needs a connection URL.
    pub fn validate(&self) -> Result<()> {
        if self.backend == CacheBackend::Redis && self.url.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingField {
                field: "url".to_string(),
                context: "[cache] with backend = \"redis\"".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = KvSessionConfig::new();
        assert!(config.session.is_none());
        assert!(config.cache.is_none());
        assert_eq!(config.session().key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.session().expire, 3600);
        assert_eq!(config.cache().backend, CacheBackend::Memory);
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
[session]
key_prefix = "sess:"
expire = 10
delete_policy = "evict"

[cache]
backend = "redis"
url = "redis://localhost:6379"
"#;
        let config = KvSessionConfig::from_toml(toml).unwrap();
        let session = config.session();
        assert_eq!(session.key_prefix, "sess:");
        assert_eq!(session.expire, 10);
        assert_eq!(session.delete_policy, DeletePolicy::Evict);

        let cache = config.cache();
        assert_eq!(cache.backend, CacheBackend::Redis);
        assert_eq!(cache.url.as_deref(), Some("redis://localhost:6379"));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config = KvSessionConfig::from_toml("[session]\nexpire = 120\n").unwrap();
        let session = config.session();
        assert_eq!(session.expire, 120);
        assert_eq!(session.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(session.delete_policy, DeletePolicy::Retain);
    }

    #[test]
    fn test_unknown_delete_policy_rejected() {
        let result = KvSessionConfig::from_toml("[session]\ndelete_policy = \"shred\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_zero_expire() {
        let config = KvSessionConfig::from_toml("[session]\nexpire = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "session.expire"));
    }

    #[test]
    fn test_validate_empty_prefix() {
        let config = KvSessionConfig::from_toml("[session]\nkey_prefix = \"\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_prefix_with_wildcard() {
        let config = KvSessionConfig::from_toml("[session]\nkey_prefix = \"sess*\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_redis_requires_url() {
        let config = KvSessionConfig::from_toml("[cache]\nbackend = \"redis\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = KvSessionConfig::from_toml(
            "[session]\nkey_prefix = \"s:\"\nexpire = 5\ndelete_policy = \"evict\"\n",
        )
        .unwrap();
        let text = config.to_toml().unwrap();
        let reparsed = KvSessionConfig::from_toml(&text).unwrap();
        assert_eq!(config, reparsed);
    }
}
