//! Persistence backends for session loading and saving.
//!
//! The cache writes every update through to a [`PersistenceBackend`] and
//! falls back to it on a miss. Nothing is assumed about the backend's
//! latency; any call may fail.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::record::{Session, SessionData, UserKey};

/// Trait for durable session storage.
///
/// Implement this trait to connect the session cache to your storage backend.
pub trait PersistenceBackend: Send + Sync {
    /// Load a session from storage.
    ///
    /// Return `Ok(None)` if the session doesn't exist. The returned record
    /// does not need to carry its identifier; the cache assigns it.
    fn load_session(&self, id: &str) -> Result<Option<Session>>;

    /// Save a session to storage.
    fn save_session(&self, id: &str, session: &Session) -> Result<()>;

    /// Delete a session from storage.
    fn delete_session(&self, id: &str) -> Result<()>;

    /// Identifiers of all stored sessions belonging to `user`.
    fn sessions_for_user(&self, user: &UserKey) -> Result<Vec<String>>;
}

impl<B: PersistenceBackend + ?Sized> PersistenceBackend for Arc<B> {
    fn load_session(&self, id: &str) -> Result<Option<Session>> {
        (**self).load_session(id)
    }

    fn save_session(&self, id: &str, session: &Session) -> Result<()> {
        (**self).save_session(id, session)
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        (**self).delete_session(id)
    }

    fn sessions_for_user(&self, user: &UserKey) -> Result<Vec<String>> {
        (**self).sessions_for_user(user)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Closure-based backend
// ─────────────────────────────────────────────────────────────────────────────

type LoadFn = Box<dyn Fn(&str) -> Result<Option<Session>> + Send + Sync>;
type SaveFn = Box<dyn Fn(&str, &Session) -> Result<()> + Send + Sync>;
type DeleteFn = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;
type UserSessionsFn = Box<dyn Fn(&UserKey) -> Result<Vec<String>> + Send + Sync>;

/// A backend assembled from closures.
///
/// Each operation without a closure is a no-op: loads find nothing, saves
/// and deletes succeed, user lookups return an empty list.
#[derive(Default)]
pub struct ExtendableBackend {
    load: Option<LoadFn>,
    save: Option<SaveFn>,
    delete: Option<DeleteFn>,
    user_sessions: Option<UserSessionsFn>,
}

impl ExtendableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_load<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Option<Session>> + Send + Sync + 'static,
    {
        self.load = Some(Box::new(f));
        self
    }

    pub fn on_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Session) -> Result<()> + Send + Sync + 'static,
    {
        self.save = Some(Box::new(f));
        self
    }

    pub fn on_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.delete = Some(Box::new(f));
        self
    }

    pub fn on_user_sessions<F>(mut self, f: F) -> Self
    where
        F: Fn(&UserKey) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        self.user_sessions = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for ExtendableBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendableBackend")
            .field("load", &self.load.is_some())
            .field("save", &self.save.is_some())
            .field("delete", &self.delete.is_some())
            .field("user_sessions", &self.user_sessions.is_some())
            .finish()
    }
}

impl PersistenceBackend for ExtendableBackend {
    fn load_session(&self, id: &str) -> Result<Option<Session>> {
        match &self.load {
            Some(f) => f(id),
            None => Ok(None),
        }
    }

    fn save_session(&self, id: &str, session: &Session) -> Result<()> {
        match &self.save {
            Some(f) => f(id, session),
            None => Ok(()),
        }
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        match &self.delete {
            Some(f) => f(id),
            None => Ok(()),
        }
    }

    fn sessions_for_user(&self, user: &UserKey) -> Result<Vec<String>> {
        match &self.user_sessions {
            Some(f) => f(user),
            None => Ok(Vec::new()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local storage of session snapshots.
///
/// Loads return a fresh record built from the stored snapshot, so a loaded
/// session never aliases the one that was saved.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload directly, bypassing any cache.
    pub fn insert(&self, id: impl Into<String>, data: SessionData) {
        self.sessions.write().insert(id.into(), data);
    }

    /// The stored payload for `id`.
    pub fn get(&self, id: &str) -> Option<SessionData> {
        self.sessions.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl PersistenceBackend for MemoryBackend {
    fn load_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.get(id).map(Session::from_data))
    }

    fn save_session(&self, id: &str, session: &Session) -> Result<()> {
        let data = session.snapshot();
        self.sessions.write().insert(id.to_string(), data);
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        self.sessions.write().remove(id);
        Ok(())
    }

    fn sessions_for_user(&self, user: &UserKey) -> Result<Vec<String>> {
        let sessions = self.sessions.read();
        let mut ids: Vec<String> = sessions
            .iter()
            .filter(|(_, data)| data.user.as_ref() == Some(user))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
