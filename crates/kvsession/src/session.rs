//! Session identity and the session contract.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CodecError;

/// Default in-memory idle timeout for a fresh [`SimpleSession`] (30 minutes).
const DEFAULT_TIMEOUT_MILLIS: u64 = 30 * 60 * 1000;

/// Unique identifier of a session.
///
/// A blank id stands for "no id" and is rejected wherever an id is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What the session store needs from a session.
///
/// Everything else about the session (its attributes, timestamps, whatever
/// the application keeps in it) is opaque to the store, which only ever
/// encodes and decodes the whole value.
pub trait Session: Serialize + DeserializeOwned + Send + Sync {
    /// The assigned id, if any.
    fn id(&self) -> Option<&SessionId>;

    /// Assign an id.
    fn set_id(&mut self, id: SessionId);

    /// Idle timeout in milliseconds.
    fn timeout_millis(&self) -> u64;

    /// Set the idle timeout in milliseconds.
    fn set_timeout_millis(&mut self, millis: u64);
}

/// Source of fresh session ids.
pub trait SessionIdGenerator: Send + Sync {
    /// Produce a new, globally unique id.
    fn generate(&self) -> SessionId;
}

/// Generates random (v4) UUID session ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl SessionIdGenerator for UuidGenerator {
    fn generate(&self) -> SessionId {
        SessionId(Uuid::new_v4().to_string())
    }
}

/// A general-purpose session with a JSON attribute bag.
///
/// Two sessions that both carry an id are equal when their ids are equal;
/// otherwise equality compares full content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleSession {
    id: Option<SessionId>,
    start_timestamp: DateTime<Utc>,
    last_access_time: DateTime<Utc>,
    timeout_millis: u64,
    expired: bool,
    host: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, serde_json::Value>,
}

impl Default for SimpleSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleSession {
    /// Create a session started now, with no id and no attributes.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            start_timestamp: now,
            last_access_time: now,
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            expired: false,
            host: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Record the originating host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Originating host, if recorded.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// When the session started.
    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.start_timestamp
    }

    /// When the session was last touched.
    pub fn last_access_time(&self) -> DateTime<Utc> {
        self.last_access_time
    }

    /// Mark the session as accessed now.
    pub fn touch(&mut self) {
        self.last_access_time = Utc::now();
    }

    /// Explicitly end the session.
    pub fn stop(&mut self) {
        self.expired = true;
    }

    /// Whether the session was stopped or has been idle longer than its
    /// timeout at `now`. A zero timeout never idles out.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.expired {
            return true;
        }
        if self.timeout_millis == 0 {
            return false;
        }
        let millis = i64::try_from(self.timeout_millis).unwrap_or(i64::MAX);
        now - self.last_access_time > Duration::milliseconds(millis)
    }

    /// Typed attribute lookup. Returns `None` if absent or of another shape.
    pub fn get_attribute<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NotSerializable`] if the value has no JSON form.
    pub fn set_attribute<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), CodecError> {
        let value = serde_json::to_value(value).map_err(|e| CodecError::NotSerializable {
            type_name: std::any::type_name::<T>(),
            reason: e.to_string(),
        })?;
        self.attributes.insert(key.into(), value);
        Ok(())
    }

    /// Remove an attribute, returning its raw value.
    pub fn remove_attribute(&mut self, key: &str) -> Option<serde_json::Value> {
        self.attributes.remove(key)
    }

    /// Attribute names in sorted order.
    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// The raw attribute bag.
    pub fn attributes(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.attributes
    }

    fn content_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.start_timestamp == other.start_timestamp
            && self.last_access_time == other.last_access_time
            && self.timeout_millis == other.timeout_millis
            && self.expired == other.expired
            && self.host == other.host
            && self.attributes == other.attributes
    }
}

impl Session for SimpleSession {
    fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: SessionId) {
        self.id = Some(id);
    }

    fn timeout_millis(&self) -> u64 {
        self.timeout_millis
    }

    fn set_timeout_millis(&mut self, millis: u64) {
        self.timeout_millis = millis;
    }
}

impl PartialEq for SimpleSession {
    fn eq(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.content_eq(other),
        }
    }
}

impl Eq for SimpleSession {}

impl Hash for SimpleSession {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.id {
            Some(id) => id.hash(state),
            // Content-equal sessions share these fields
            None => {
                self.start_timestamp.hash(state);
                self.timeout_millis.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_id_blank() {
        assert!(SessionId::new("").is_blank());
        assert!(SessionId::new("  ").is_blank());
        assert!(!SessionId::new("abc").is_blank());
        assert_eq!(SessionId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_uuid_generator_unique() {
        let generator = UuidGenerator;
        let a = generator.generate();
        let b = generator.generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_attributes() {
        let mut session = SimpleSession::new();
        session.set_attribute("user", "alice").unwrap();
        session.set_attribute("roles", &vec!["admin", "ops"]).unwrap();

        assert_eq!(session.get_attribute::<String>("user").as_deref(), Some("alice"));
        assert_eq!(
            session.get_attribute::<Vec<String>>("roles"),
            Some(vec!["admin".to_string(), "ops".to_string()])
        );
        assert_eq!(session.get_attribute::<u32>("user"), None);
        assert_eq!(session.attribute_keys().collect::<Vec<_>>(), vec!["roles", "user"]);

        assert!(session.remove_attribute("user").is_some());
        assert!(session.get_attribute::<String>("user").is_none());
    }

    #[test]
    fn test_equality_by_id() {
        let mut a = SimpleSession::new();
        let mut b = SimpleSession::new();
        a.set_id(SessionId::new("same"));
        b.set_id(SessionId::new("same"));
        b.set_attribute("x", &1).unwrap();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_equality_without_id_compares_content() {
        let a = SimpleSession::new();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.set_attribute("x", &1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_expiry() {
        let mut session = SimpleSession::new();
        session.set_timeout_millis(1_000);
        let start = session.last_access_time();

        assert!(!session.is_expired_at(start + Duration::milliseconds(500)));
        assert!(session.is_expired_at(start + Duration::milliseconds(1_500)));

        session.set_timeout_millis(0);
        assert!(!session.is_expired_at(start + Duration::days(365)));

        session.stop();
        assert!(session.is_expired_at(start));
    }

    #[test]
    fn test_touch_moves_last_access() {
        let mut session = SimpleSession::new();
        let before = session.last_access_time();
        session.touch();
        assert!(session.last_access_time() >= before);
        assert_eq!(session.start_timestamp(), before);
    }

    #[test]
    fn test_host() {
        let session = SimpleSession::new().with_host("10.0.0.1");
        assert_eq!(session.host(), Some("10.0.0.1"));
    }
}
