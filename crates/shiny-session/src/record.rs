//! The session record managed by the cache.
//!
//! A [`Session`] pairs the persisted payload ([`SessionData`]) with the
//! identifier it is cached under. Both live behind one per-record lock:
//! readers take it shared, mutations take it exclusive. The identifier is
//! not part of the persisted payload and is assigned at most once.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Opaque key of the user a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for UserKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// The persisted part of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Owning user; `None` for anonymous sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserKey>,

    /// When the session was created.
    pub created: DateTime<Utc>,

    /// Last time the session was written through the cache.
    pub last_access: DateTime<Utc>,

    /// Remote address (IP:port) of the last request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_remote_addr: Option<String>,

    /// Fingerprint of the last request's user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_user_agent_hash: Option<u64>,

    /// Identifier of the session that replaced this one after rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,

    /// Caller-defined payload.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl SessionData {
    /// Fresh anonymous payload created at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            user: None,
            created: now,
            last_access: now,
            last_remote_addr: None,
            last_user_agent_hash: None,
            superseded_by: None,
            attributes: Map::new(),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    id: Option<String>,
    data: SessionData,
}

/// A lock-protected session record.
///
/// Records are shared as `Arc<Session>` between the cache and its callers.
#[derive(Debug)]
pub struct Session {
    state: RwLock<SessionState>,
}

impl Session {
    /// Create an anonymous session without an identifier.
    ///
    /// `created` is wall-clock time. Use [`Session::new_at`] when the cache
    /// runs on another [`Clock`](crate::Clock).
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    /// Create an anonymous session created at `now`.
    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self::from_data(SessionData::new(now))
    }

    /// Create an anonymous session with its identifier already assigned.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::with_id_at(id, Utc::now())
    }

    /// Create a session with its identifier assigned, created at `now`.
    pub fn with_id_at(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let session = Self::new_at(now);
        session.state.write().id = Some(id.into());
        session
    }

    /// Wrap a payload loaded from storage. The identifier is left unset.
    pub fn from_data(data: SessionData) -> Self {
        Self {
            state: RwLock::new(SessionState { id: None, data }),
        }
    }

    /// The identifier, once assigned.
    pub fn id(&self) -> Option<String> {
        self.state.read().id.clone()
    }

    /// Assign the identifier.
    ///
    /// Assigning the identifier the session already carries is a no-op;
    /// any other value is rejected.
    pub fn assign_id(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();
        match &state.id {
            None => {
                state.id = Some(id.to_string());
                Ok(())
            }
            Some(current) if current == id => Ok(()),
            Some(current) => Err(Error::IdentifierReassigned {
                current: current.clone(),
                requested: id.to_string(),
            }),
        }
    }

    /// Stamp the access time and hand back the identifier.
    pub(crate) fn stamp_access(&self, now: DateTime<Utc>) -> Result<String> {
        let mut state = self.state.write();
        let id = match &state.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => return Err(Error::MissingIdentifier),
        };
        state.data.last_access = now;
        Ok(id)
    }

    /// Copy of the persisted payload.
    pub fn snapshot(&self) -> SessionData {
        self.state.read().data.clone()
    }

    /// Run `f` with shared access to the payload.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionData) -> R,
    {
        f(&self.state.read().data)
    }

    /// Run `f` with exclusive access to the payload.
    pub fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SessionData) -> R,
    {
        f(&mut self.state.write().data)
    }

    pub fn user(&self) -> Option<UserKey> {
        self.read(|data| data.user.clone())
    }

    pub fn set_user(&self, user: Option<UserKey>) {
        self.write(|data| data.user = user);
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.read(|data| data.created)
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.read(|data| data.last_access)
    }

    pub fn superseded_by(&self) -> Option<String> {
        self.read(|data| data.superseded_by.clone())
    }

    /// Point this session at the one that replaced it.
    pub fn set_superseded_by(&self, id: impl Into<String>) {
        let id = id.into();
        self.write(|data| data.superseded_by = Some(id));
    }

    /// Remember where the last request came from.
    pub fn record_client(&self, remote_addr: Option<String>, user_agent_hash: Option<u64>) {
        self.write(|data| {
            data.last_remote_addr = remote_addr;
            data.last_user_agent_hash = user_agent_hash;
        });
    }

    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.read(|data| data.attributes.get(key).cloned())
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let (key, value) = (key.into(), value.into());
        self.write(|data| data.attributes.insert(key, value))
    }

    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.write(|data| data.attributes.remove(key))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_is_anonymous() {
        let session = Session::new();
        assert!(session.id().is_none());
        assert!(session.user().is_none());
        assert_eq!(session.created(), session.last_access());
    }

    #[test]
    fn test_new_at_uses_given_time() {
        let at = DateTime::<Utc>::UNIX_EPOCH + chrono::TimeDelta::days(1);

        let session = Session::with_id_at("s1", at);
        assert_eq!(session.id().as_deref(), Some("s1"));
        assert_eq!(session.created(), at);
        assert_eq!(session.last_access(), at);

        let anonymous = Session::new_at(at);
        assert!(anonymous.id().is_none());
        assert_eq!(anonymous.created(), at);
    }

    #[test]
    fn test_assign_id_once() {
        let session = Session::new();
        session.assign_id("abc").unwrap();
        assert_eq!(session.id().as_deref(), Some("abc"));

        // Same value is accepted
        session.assign_id("abc").unwrap();

        let err = session.assign_id("xyz").unwrap_err();
        assert!(matches!(err, Error::IdentifierReassigned { .. }));
        assert_eq!(session.id().as_deref(), Some("abc"));
    }

    #[test]
    fn test_stamp_access_requires_id() {
        let session = Session::new();
        let before = session.last_access();
        let later = before + chrono::TimeDelta::seconds(10);

        assert!(matches!(
            session.stamp_access(later),
            Err(Error::MissingIdentifier)
        ));
        assert_eq!(session.last_access(), before);

        let session = Session::with_id("");
        assert!(matches!(
            session.stamp_access(later),
            Err(Error::MissingIdentifier)
        ));
    }

    #[test]
    fn test_stamp_access_updates_time() {
        let session = Session::with_id("s1");
        let later = session.last_access() + chrono::TimeDelta::minutes(5);

        assert_eq!(session.stamp_access(later).unwrap(), "s1");
        assert_eq!(session.last_access(), later);
    }

    #[test]
    fn test_attributes() {
        let session = Session::new();
        assert_eq!(session.set_attribute("cart", json!([1, 2])), None);
        assert_eq!(
            session.set_attribute("cart", json!([3])),
            Some(json!([1, 2]))
        );
        assert_eq!(session.attribute("cart"), Some(json!([3])));
        assert_eq!(session.remove_attribute("cart"), Some(json!([3])));
        assert!(session.attribute("cart").is_none());
    }

    #[test]
    fn test_snapshot_excludes_identifier() {
        let session = Session::with_id("secret-id");
        session.set_user(Some(UserKey::new("alice")));
        session.record_client(Some("10.0.0.1:4000".into()), Some(42));
        session.set_superseded_by("newer");

        let json = serde_json::to_string(&session.snapshot()).unwrap();
        assert!(!json.contains("secret-id"));
        assert!(json.contains("alice"));
        assert!(json.contains("newer"));

        let restored = Session::from_data(serde_json::from_str(&json).unwrap());
        assert!(restored.id().is_none());
        assert_eq!(restored.snapshot(), session.snapshot());
    }

    #[test]
    fn test_payload_defaults_on_load() {
        let json = r#"{"created":"2024-01-01T00:00:00Z","last_access":"2024-01-02T00:00:00Z"}"#;
        let data: SessionData = serde_json::from_str(json).unwrap();
        assert!(data.user.is_none());
        assert!(data.attributes.is_empty());
        assert!(data.last_user_agent_hash.is_none());
    }
}
