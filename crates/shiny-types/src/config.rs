//! Configuration traits for decoupled config passing between crates.
//!
//! The session cache only needs to know its capacity and expiry; the store
//! only needs a database path. These traits let either side be configured
//! from the full TOML configuration without depending on the config crate.

use std::path::PathBuf;
use std::time::Duration;

/// Base trait for all configuration types.
///
/// Implementations should be cheaply cloneable and thread-safe.
pub trait ConfigProvider: Clone + Send + Sync + 'static {}

/// Session cache configuration.
pub trait HasCacheConfig: ConfigProvider {
    /// Maximum number of cached sessions.
    ///
    /// `0` disables in-memory caching, a negative value means unbounded.
    fn cache_capacity(&self) -> i64;

    /// Maximum idle time before a cached session is considered stale.
    fn cache_expiry(&self) -> Duration {
        defaults::cache_expiry()
    }
}

/// Durable store configuration.
pub trait HasStoreConfig: ConfigProvider {
    /// Path of the session database, `None` for the platform default.
    fn store_path(&self) -> Option<PathBuf>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default values
// ─────────────────────────────────────────────────────────────────────────────

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    pub const CACHE_CAPACITY: i64 = 1024 * 1024;
    pub const CACHE_EXPIRY_SECS: u64 = 3600;
    pub const STORE_FILE: &str = "sessions.db";

    pub fn cache_expiry() -> Duration {
        Duration::from_secs(CACHE_EXPIRY_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Standalone provider
// ─────────────────────────────────────────────────────────────────────────────

/// Standalone cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfigProvider {
    pub capacity: i64,
    pub expiry: Duration,
}

impl Default for CacheConfigProvider {
    fn default() -> Self {
        Self {
            capacity: defaults::CACHE_CAPACITY,
            expiry: defaults::cache_expiry(),
        }
    }
}

impl ConfigProvider for CacheConfigProvider {}

impl HasCacheConfig for CacheConfigProvider {
    fn cache_capacity(&self) -> i64 {
        self.capacity
    }

    fn cache_expiry(&self) -> Duration {
        self.expiry
    }
}
