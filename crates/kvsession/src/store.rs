//! Session persistence over a [`CacheClient`].
//!
//! Each session lives at `<key_prefix><session id>` as codec bytes, with a
//! TTL of `expire_secs` reapplied on every save. Expiry is left entirely to
//! the cache; the store keeps no state of its own beyond its configuration.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use kvsession_cache::{CacheClient, CacheError};
use kvsession_config::DeletePolicy;
use tracing::{debug, error, trace, warn};

use crate::codec::{Codec, JsonCodec};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::session::{Session, SessionId, SessionIdGenerator, UuidGenerator};

/// Outcome of [`SessionStore::read`].
#[derive(Debug)]
pub enum ReadOutcome<S> {
    /// The session was present and decoded.
    Found(S),
    /// No entry exists for the id (never created, deleted, or expired).
    NotFound,
    /// The read could not be completed.
    Error(StoreError),
}

impl<S> ReadOutcome<S> {
    /// The session, if found. Errors and misses both become `None`.
    pub fn into_option(self) -> Option<S> {
        match self {
            Self::Found(session) => Some(session),
            Self::NotFound | Self::Error(_) => None,
        }
    }

    /// Whether a session was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Stores sessions of type `S` in a cache, encoded with `C`.
///
/// Cloning is cheap; clones share the cache client and id generator.
pub struct SessionStore<S, C = JsonCodec> {
    cache: Arc<dyn CacheClient>,
    codec: C,
    config: StoreConfig,
    ids: Arc<dyn SessionIdGenerator>,
    _session: PhantomData<fn() -> S>,
}

impl<S, C: Clone> Clone for SessionStore<S, C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            codec: self.codec.clone(),
            config: self.config.clone(),
            ids: Arc::clone(&self.ids),
            _session: PhantomData,
        }
    }
}

impl<S, C> fmt::Debug for SessionStore<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: Session> SessionStore<S> {
    /// Create a store using the JSON codec and UUID session ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `config` fails
    /// [`StoreConfig::validate`].
    pub fn new(cache: Arc<dyn CacheClient>, config: StoreConfig) -> Result<Self> {
        config.validate().inspect_err(|e| {
            error!(error = %e, "Rejecting session store configuration");
        })?;
        Ok(Self {
            cache,
            codec: JsonCodec,
            config,
            ids: Arc::new(UuidGenerator),
            _session: PhantomData,
        })
    }
}

impl<S: Session, C: Codec> SessionStore<S, C> {
    /// Swap the payload codec.
    pub fn with_codec<C2: Codec>(self, codec: C2) -> SessionStore<S, C2> {
        SessionStore {
            cache: self.cache,
            codec,
            config: self.config,
            ids: self.ids,
            _session: PhantomData,
        }
    }

    /// Swap the session id generator.
    pub fn with_id_generator(mut self, ids: impl SessionIdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Cache key for a session id.
    pub fn session_key(&self, id: &SessionId) -> Vec<u8> {
        format!("{}{}", self.config.key_prefix, id).into_bytes()
    }

    /// Key pattern matching every session in this store's namespace.
    pub fn scan_pattern(&self) -> String {
        format!("{}*", self.config.key_prefix)
    }

    /// Timeout stamped on sessions when they are saved.
    pub fn timeout_millis(&self) -> u64 {
        self.config.timeout_millis()
    }

    /// Assign a fresh id to `session` and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if the session already carries an
    /// id. Encoding and cache failures are propagated; in that case the id
    /// has already been assigned.
    pub async fn create(&self, session: &mut S) -> Result<SessionId> {
        if let Some(existing) = session.id().filter(|id| !id.is_blank()) {
            error!(session_id = %existing, "Refusing to create a session that already has an id");
            return Err(StoreError::InvalidInput(format!(
                "session already has id '{existing}'"
            )));
        }

        let id = self.ids.generate();
        debug!(session_id = %id, "Creating session");
        session.set_id(id.clone());
        self.save(session).await?;
        Ok(id)
    }

    /// Look up a session by id.
    pub async fn read(&self, id: &SessionId) -> ReadOutcome<S> {
        if id.is_blank() {
            error!("Session id is blank");
            return ReadOutcome::Error(StoreError::InvalidInput(
                "session id is blank".to_string(),
            ));
        }

        debug!(session_id = %id, "Reading session");
        let bytes = match self.cache.get(&self.session_key(id)).await {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => {
                trace!(session_id = %id, "Session not found");
                return ReadOutcome::NotFound;
            }
            Err(e) => {
                error!(session_id = %id, error = %e, "Failed to fetch session");
                return ReadOutcome::Error(e.into());
            }
        };

        match self.codec.decode::<S>(&bytes) {
            Ok(session) => {
                trace!(session_id = %id, "Session found in cache");
                ReadOutcome::Found(session)
            }
            Err(e) => {
                error!(session_id = %id, error = %e, "Failed to decode session");
                ReadOutcome::Error(e.into())
            }
        }
    }

    /// Look up a session by id, treating every failure as absence.
    pub async fn read_session(&self, id: &SessionId) -> Option<S> {
        self.read(id).await.into_option()
    }

    /// Persist the current state of a session and refresh its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if the session has no id.
    pub async fn update(&self, session: &mut S) -> Result<()> {
        self.save(session).await
    }

    /// Delete a session according to the configured [`DeletePolicy`].
    ///
    /// With [`DeletePolicy::Retain`] this only validates the session; the
    /// entry stays readable until its TTL runs out.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if the session has no id.
    pub async fn delete(&self, session: &S) -> Result<()> {
        let id = require_id(session)?;

        match self.config.delete_policy {
            DeletePolicy::Retain => {
                debug!(session_id = %id, "Delete requested, entry retained until expiry");
            }
            DeletePolicy::Evict => {
                let removed = self.cache.del(&self.session_key(id)).await?;
                debug!(session_id = %id, removed, "Session evicted");
            }
        }
        Ok(())
    }

    /// Every live session in this store's namespace.
    ///
    /// Entries that expire between the scan and the fetch are skipped, as are
    /// entries that do not decode. Sessions that compare equal collapse.
    pub async fn active_sessions(&self) -> Result<HashSet<S>>
    where
        S: Eq + Hash,
    {
        let keys = self.cache.keys(&self.scan_pattern()).await?;
        let mut sessions = HashSet::with_capacity(keys.len());

        for key in keys {
            let bytes = match self.cache.get(&key).await {
                Ok(Some(bytes)) if !bytes.is_empty() => bytes,
                Ok(_) => continue,
                Err(CacheError::WrongType) => {
                    warn!(key = %String::from_utf8_lossy(&key), "Skipping non-session entry");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match self.codec.decode::<S>(&bytes) {
                Ok(session) => {
                    sessions.insert(session);
                }
                Err(e) => {
                    warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Skipping undecodable session entry"
                    );
                }
            }
        }

        debug!(count = sessions.len(), "Listed active sessions");
        Ok(sessions)
    }

    /// Number of live entries in this store's namespace.
    pub async fn active_session_count(&self) -> Result<usize> {
        let count = self.cache.keys(&self.scan_pattern()).await?.len();
        debug!(count, "Counted active sessions");
        Ok(count)
    }

    /// Encode first, then stamp the timeout, then write with expiry. The
    /// persisted copy therefore carries the timeout from before this save.
    async fn save(&self, session: &mut S) -> Result<()> {
        let id = require_id(session)?.clone();

        let bytes = self.codec.encode(&*session).inspect_err(|e| {
            error!(session_id = %id, error = %e, "Failed to encode session");
        })?;
        session.set_timeout_millis(self.config.timeout_millis());

        self.cache
            .set_ex(&self.session_key(&id), self.config.expire_secs, &bytes)
            .await?;
        debug!(session_id = %id, expire_secs = self.config.expire_secs, "Session saved");
        Ok(())
    }
}

fn require_id<S: Session>(session: &S) -> Result<&SessionId> {
    match session.id() {
        Some(id) if !id.is_blank() => Ok(id),
        _ => {
            error!("Session id is missing");
            Err(StoreError::InvalidInput("session id is missing".to_string()))
        }
    }
}
