//! Bounded write-through session cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shiny_types::HasCacheConfig;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, Capacity};
use crate::error::Result;
use crate::persistence::PersistenceBackend;
use crate::record::Session;

type Entries = HashMap<String, Arc<Session>>;

/// Session cache with expiry and oldest-access-first eviction.
///
/// This cache provides:
/// - Lookup by identifier with fallback to the backend on a miss
/// - Write-through of every `set` to the backend
/// - Expiry of entries idle longer than the configured duration
/// - A hard bound on the number of entries, evicting the least recently
///   accessed first
///
/// All work runs on the caller's thread. The structural lock is held for the
/// whole of `get`, `set`, `compact` and `purge_all`, including backend calls,
/// so a slow backend serializes cache access. Record locks are only ever
/// taken while the structural lock is held, never the other way round.
pub struct SessionCache<B: PersistenceBackend> {
    entries: Arc<Mutex<Entries>>,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl<B: PersistenceBackend> SessionCache<B> {
    /// Create a new session cache on top of a persistence backend.
    pub fn new(config: CacheConfig, backend: B) -> Self {
        Self::with_shared_backend(config, Arc::new(backend))
    }

    /// Create a session cache sharing a backend with other owners.
    pub fn with_shared_backend(config: CacheConfig, backend: Arc<B>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            backend,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Create a session cache from a configuration provider.
    pub fn from_cache_config<C: HasCacheConfig>(backend: B, config: &C) -> Self {
        Self::new(CacheConfig::from_provider(config), backend)
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The backend sessions are written through to.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Get the current number of cached sessions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Check if a session is held in memory (without loading).
    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.config.capacity,
            expiry: self.config.expiry,
        }
    }

    /// Get a session from the cache or load it from the backend.
    ///
    /// A hit never touches the backend. On a miss the loaded record gets
    /// `id` assigned and, unless caching is disabled, is admitted after
    /// compaction has made room for it. Returns `Ok(None)` when the backend
    /// has no such session.
    ///
    /// If compaction fails the loaded record is still admitted when there is
    /// room for it, and the compaction error is returned. The record stays
    /// in the backend either way.
    pub fn get(&self, id: &str) -> Result<Option<Arc<Session>>> {
        let mut entries = self.entries.lock();

        if let Some(session) = entries.get(id) {
            trace!(session_id = %id, "Session found in cache");
            return Ok(Some(Arc::clone(session)));
        }

        debug!(session_id = %id, "Session cache miss, loading from persistence");
        let Some(session) = self.backend.load_session(id)? else {
            trace!(session_id = %id, "Session not found in persistence");
            return Ok(None);
        };

        let session = Arc::new(session);
        session.assign_id(id)?;

        if self.config.capacity.is_enabled() {
            let compacted = self.compact_locked(&mut entries, 1);
            if self.has_room(&entries, 1) {
                entries.insert(id.to_string(), Arc::clone(&session));
                debug!(
                    session_id = %id,
                    cache_size = entries.len(),
                    "Session loaded from persistence"
                );
            }
            compacted?;
        }

        Ok(Some(session))
    }

    /// Insert or update a session and write it through to the backend.
    ///
    /// The session must already carry an identifier. Its access time is
    /// stamped before anything else happens, and it is saved exactly once
    /// even when compaction fails. If the backend save fails the in-memory
    /// entry is kept and the error is returned.
    ///
    /// A compaction failure does not stop the write-through. The session is
    /// then cached only if the capacity bound still allows it, and the
    /// compaction error takes precedence over the save result.
    pub fn set(&self, session: &Arc<Session>) -> Result<()> {
        let mut entries = self.entries.lock();
        let id = session.stamp_access(self.clock.now())?;

        let required_space = usize::from(!entries.contains_key(&id));
        let compacted = self.compact_locked(&mut entries, required_space);

        if self.has_room(&entries, required_space) {
            entries.insert(id.clone(), Arc::clone(session));
            trace!(
                session_id = %id,
                cache_size = entries.len(),
                "Session stored in cache"
            );
        } else if compacted.is_err() {
            debug!(session_id = %id, "Compaction failed, session not cached");
        }

        let saved = self.backend.save_session(&id, session);
        compacted.and(saved)
    }

    /// Sweep expired entries and enforce the capacity bound now.
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut entries = self.entries.lock();
        self.compact_locked(&mut entries, 0)
    }

    /// Flush every cached session to the backend and empty the cache.
    ///
    /// Save failures are logged and otherwise ignored; the cache is emptied
    /// regardless. Returns the number of sessions that were cached.
    pub fn purge_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let purged = std::mem::take(&mut *entries);

        for (id, session) in &purged {
            if let Err(e) = self.backend.save_session(id, session) {
                warn!(session_id = %id, error = %e, "Failed to flush session during purge");
            }
        }

        debug!(count = purged.len(), "Purged session cache");
        purged.len()
    }

    /// Whether `required_space` more entries fit under the capacity bound.
    fn has_room(&self, entries: &Entries, required_space: usize) -> bool {
        self.config
            .capacity
            .limit()
            .is_none_or(|limit| entries.len() + required_space <= limit)
    }

    /// Expiry sweep followed by capacity eviction, leaving room for
    /// `required_space` new entries.
    ///
    /// Every removed session is saved first. A failed save aborts the pass
    /// with the error; entries already removed stay removed.
    fn compact_locked(
        &self,
        entries: &mut Entries,
        required_space: usize,
    ) -> Result<CompactionStats> {
        let mut stats = CompactionStats::default();

        if let Some(expiry) = self.config.expiry_delta() {
            let now = self.clock.now();
            let mut stale: Vec<String> = entries
                .iter()
                .filter(|(_, session)| now - session.last_access() > expiry)
                .map(|(id, _)| id.clone())
                .collect();
            stale.sort_unstable();

            for id in stale {
                if let Some(session) = entries.remove(&id) {
                    debug!(session_id = %id, "Session expired, removing from cache");
                    stats.expired += 1;
                    self.backend.save_session(&id, &session)?;
                }
            }
        }

        let Some(limit) = self.config.capacity.limit() else {
            return Ok(stats);
        };
        if entries.len() + required_space <= limit {
            return Ok(stats);
        }

        let required_space = required_space.min(limit);
        while entries.len() + required_space > limit {
            let Some((id, session)) = oldest_entry(entries) else {
                break;
            };
            debug!(session_id = %id, "Evicting oldest session to make room");
            self.backend.save_session(&id, &session)?;
            entries.remove(&id);
            stats.evicted += 1;
        }

        if stats.expired + stats.evicted > 0 {
            debug!(
                expired = stats.expired,
                evicted = stats.evicted,
                cache_size = entries.len(),
                "Compacted session cache"
            );
        }

        Ok(stats)
    }
}

/// The least recently accessed entry; ties go to the smallest identifier.
fn oldest_entry(entries: &Entries) -> Option<(String, Arc<Session>)> {
    entries
        .iter()
        .map(|(id, session)| (session.last_access(), id, session))
        .min_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)))
        .map(|(_, id, session)| (id.clone(), Arc::clone(session)))
}

impl<B: PersistenceBackend> Clone for SessionCache<B> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current number of cached sessions.
    pub size: usize,

    /// Configured capacity.
    pub capacity: Capacity,

    /// Configured idle expiry.
    pub expiry: Duration,
}

/// What a compaction pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Entries removed because they were idle past the expiry.
    pub expired: usize,

    /// Entries removed to satisfy the capacity bound.
    pub evicted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use crate::persistence::{ExtendableBackend, MemoryBackend};
    use chrono::TimeDelta;

    fn cache_with(capacity: i64, expiry: Duration) -> (SessionCache<MemoryBackend>, ManualClock) {
        let clock = ManualClock::default();
        let config = CacheConfig::new()
            .with_capacity(capacity)
            .with_expiry(expiry);
        let cache = SessionCache::new(config, MemoryBackend::new()).with_clock(clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_set_and_get() {
        let (cache, _) = cache_with(10, Duration::from_secs(3600));

        let session = Arc::new(Session::with_id("session-1"));
        session.set_attribute("n", 1);
        cache.set(&session).unwrap();

        let retrieved = cache.get("session-1").unwrap().unwrap();
        assert!(Arc::ptr_eq(&retrieved, &session));
        assert_eq!(cache.backend().len(), 1);
    }

    #[test]
    fn test_get_unknown_returns_none() {
        let (cache, _) = cache_with(10, Duration::from_secs(3600));

        assert!(cache.get("nonexistent").unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_without_id_fails() {
        let (cache, _) = cache_with(10, Duration::from_secs(3600));

        let result = cache.set(&Arc::new(Session::new()));
        assert!(matches!(result, Err(Error::MissingIdentifier)));
        assert!(cache.backend().is_empty());
    }

    #[test]
    fn test_miss_fill_assigns_id() {
        let (cache, _) = cache_with(10, Duration::from_secs(3600));
        cache.backend().insert("stored", Session::new().snapshot());

        let session = cache.get("stored").unwrap().unwrap();
        assert_eq!(session.id().as_deref(), Some("stored"));
        assert!(cache.contains("stored"));
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let (cache, clock) = cache_with(3, Duration::from_secs(3600));

        for i in 1..=3 {
            cache
                .set(&Arc::new(Session::with_id(format!("session-{i}"))))
                .unwrap();
            clock.advance(TimeDelta::seconds(1));
        }

        // Refresh session-1 so session-2 becomes the oldest
        let first = cache.get("session-1").unwrap().unwrap();
        cache.set(&first).unwrap();
        clock.advance(TimeDelta::seconds(1));

        cache.set(&Arc::new(Session::with_id("session-4"))).unwrap();

        assert_eq!(cache.len(), 3);
        assert!(cache.contains("session-1"));
        assert!(!cache.contains("session-2"));
        assert!(cache.contains("session-3"));
        assert!(cache.contains("session-4"));
    }

    #[test]
    fn test_update_existing_does_not_evict() {
        let (cache, clock) = cache_with(2, Duration::from_secs(3600));

        let a = Arc::new(Session::with_id("a"));
        cache.set(&a).unwrap();
        cache.set(&Arc::new(Session::with_id("b"))).unwrap();
        clock.advance(TimeDelta::seconds(1));

        a.set_attribute("k", "v");
        cache.set(&a).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_tie_break_is_smallest_id() {
        let (cache, _) = cache_with(2, Duration::from_secs(3600));

        cache.set(&Arc::new(Session::with_id("b"))).unwrap();
        cache.set(&Arc::new(Session::with_id("a"))).unwrap();
        cache.set(&Arc::new(Session::with_id("c"))).unwrap();

        // a and b share the same access time; c was stamped at the same
        // instant too, but it is the entry being admitted.
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_compact_sweeps_expired() {
        let (cache, clock) = cache_with(10, Duration::from_secs(60));

        cache.set(&Arc::new(Session::with_id("old"))).unwrap();
        clock.advance(TimeDelta::seconds(30));
        cache.set(&Arc::new(Session::with_id("fresh"))).unwrap();
        clock.advance(TimeDelta::seconds(31));

        let stats = cache.compact().unwrap();
        assert_eq!(
            stats,
            CompactionStats {
                expired: 1,
                evicted: 0
            }
        );
        assert!(!cache.contains("old"));
        assert!(cache.contains("fresh"));
    }

    #[test]
    fn test_exactly_expiry_is_not_stale() {
        let (cache, clock) = cache_with(10, Duration::from_secs(60));

        cache.set(&Arc::new(Session::with_id("edge"))).unwrap();
        clock.advance(TimeDelta::seconds(60));

        assert_eq!(cache.compact().unwrap().expired, 0);
        assert!(cache.contains("edge"));
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let (cache, _) = cache_with(0, Duration::from_secs(3600));
        cache.backend().insert("stored", Session::new().snapshot());

        cache.set(&Arc::new(Session::with_id("s1"))).unwrap();
        let loaded = cache.get("stored").unwrap().unwrap();

        assert_eq!(loaded.id().as_deref(), Some("stored"));
        assert!(cache.is_empty());
        assert_eq!(cache.backend().len(), 2);
    }

    #[test]
    fn test_purge_all_flushes_and_empties() {
        let (cache, clock) = cache_with(10, Duration::from_secs(3600));

        let session = Arc::new(Session::with_id("s1"));
        cache.set(&session).unwrap();
        session.set_attribute("late", true);
        clock.advance(TimeDelta::seconds(5));

        assert_eq!(cache.purge_all(), 1);
        assert!(cache.is_empty());
        let stored = cache.backend().get("s1").unwrap();
        assert_eq!(stored.attributes.get("late"), Some(&true.into()));
    }

    #[test]
    fn test_purge_all_ignores_save_failures() {
        let config = CacheConfig::new().with_capacity(10_i64);
        let backend = ExtendableBackend::new()
            .on_save(|id, _| Err(Error::Persistence(format!("cannot save {id}"))));
        let cache = SessionCache::new(config, backend);

        let session = Arc::new(Session::with_id("s1"));
        assert!(cache.set(&session).is_err());
        assert!(cache.contains("s1"));

        assert_eq!(cache.purge_all(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats() {
        let (cache, _) = cache_with(100, Duration::from_secs(60));

        for i in 1..=5 {
            cache
                .set(&Arc::new(Session::with_id(format!("session-{i}"))))
                .unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.size, 5);
        assert_eq!(stats.capacity, Capacity::from(100_i64));
        assert_eq!(stats.expiry, Duration::from_secs(60));
    }

    #[test]
    fn test_clones_share_entries() {
        let (cache, _) = cache_with(10, Duration::from_secs(3600));
        let other = cache.clone();

        cache.set(&Arc::new(Session::with_id("shared"))).unwrap();
        assert!(other.contains("shared"));
    }
}
