//! Session store implementation using SQLite.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use shiny_session::{PersistenceBackend, Session, SessionData, UserKey};
use shiny_types::{HasStoreConfig, config_defaults};
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

/// Application name for data directory resolution.
const APP_NAME: &str = "shiny";

/// Platform default location of the session database.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_NAME).join(config_defaults::STORE_FILE))
}

/// Summary row for listing stored sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub id: String,
    pub user: Option<UserKey>,
    pub created: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

/// Session store backed by SQLite.
///
/// Uses WAL mode for better concurrent read performance. The connection is
/// serialized behind a mutex, so one store can be shared across threads.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Initialization
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteBackend {
    /// Open or create a session store at the given path.
    ///
    /// Creates the database file, its parent directories and the schema if
    /// they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::InvalidPath {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        let store = Self::with_connection(conn)?;

        info!("Session store opened at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let store = Self::with_connection(Connection::open_in_memory()?)?;
        debug!("In-memory session store created");
        Ok(store)
    }

    /// Open the store described by a configuration provider, falling back to
    /// the platform data directory.
    pub fn from_store_config<C: HasStoreConfig>(config: &C) -> Result<Self> {
        let path = config
            .store_path()
            .or_else(default_store_path)
            .ok_or_else(|| StoreError::InvalidPath {
                path: String::new(),
                reason: "no store path configured and no platform data directory".to_string(),
            })?;
        Self::open(path)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create the database schema.
    fn create_schema(conn: &Connection) -> Result<()> {
        let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if current_version >= SCHEMA_VERSION {
            debug!("Schema up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating schema from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        conn.execute_batch(
            r#"
            -- Sessions table: one JSON payload per session identifier
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_key TEXT,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_access TEXT NOT NULL
            );

            -- Index for per-user lookups
            CREATE INDEX IF NOT EXISTS idx_sessions_user_key
                ON sessions(user_key);

            -- Index for idle cleanup
            CREATE INDEX IF NOT EXISTS idx_sessions_last_access
                ON sessions(last_access);
            "#,
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session operations
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteBackend {
    /// Get a session payload by ID.
    pub fn load(&self, id: &str) -> Result<Option<SessionData>> {
        let conn = self.conn.lock();

        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(StoreError::from))
            .transpose()
    }

    /// Insert or replace a session payload.
    pub fn save(&self, id: &str, data: &SessionData) -> Result<()> {
        let payload = serde_json::to_string(data)?;
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO sessions (id, user_key, payload, created_at, last_access)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                user_key = excluded.user_key,
                payload = excluded.payload,
                last_access = excluded.last_access
            "#,
            params![
                id,
                data.user.as_ref().map(UserKey::as_str),
                payload,
                timestamp(&data.created),
                timestamp(&data.last_access),
            ],
        )?;

        debug!(session_id = %id, "Saved session");
        Ok(())
    }

    /// Delete a session by ID. Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    /// Identifiers of all sessions owned by `user`, ordered by identifier.
    pub fn ids_for_user(&self, user: &UserKey) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM sessions WHERE user_key = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![user.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Number of stored sessions.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|e| StoreError::InvalidData(e.to_string()))
    }

    /// List sessions, most recently accessed first.
    pub fn list(&self, limit: usize) -> Result<Vec<StoredSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_key, created_at, last_access
            FROM sessions
            ORDER BY last_access DESC, id
            LIMIT ?1
            "#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![limit])?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(Self::row_to_stored(row)?);
        }

        Ok(sessions)
    }

    /// Delete every session last accessed before `cutoff`.
    ///
    /// Returns the number of sessions removed.
    pub fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM sessions WHERE last_access < ?1",
            params![timestamp(&cutoff)],
        )?;
        if removed > 0 {
            info!(removed, "Deleted idle sessions");
        }
        Ok(removed)
    }

    fn row_to_stored(row: &rusqlite::Row) -> Result<StoredSession> {
        let id: String = row.get(0)?;
        let user: Option<String> = row.get(1)?;
        let created: String = row.get(2)?;
        let last_access: String = row.get(3)?;

        Ok(StoredSession {
            id,
            user: user.map(UserKey::from),
            created: parse_timestamp(&created)?,
            last_access: parse_timestamp(&last_access)?,
        })
    }
}

/// Fixed-width RFC 3339 so text comparison matches time order.
fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache backend
// ─────────────────────────────────────────────────────────────────────────────

impl PersistenceBackend for SqliteBackend {
    fn load_session(&self, id: &str) -> shiny_session::Result<Option<Session>> {
        Ok(self.load(id)?.map(Session::from_data))
    }

    fn save_session(&self, id: &str, session: &Session) -> shiny_session::Result<()> {
        Ok(self.save(id, &session.snapshot())?)
    }

    fn delete_session(&self, id: &str) -> shiny_session::Result<()> {
        self.delete(id)?;
        Ok(())
    }

    fn sessions_for_user(&self, user: &UserKey) -> shiny_session::Result<Vec<String>> {
        Ok(self.ids_for_user(user)?)
    }
}
