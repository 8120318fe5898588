//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [cache]                  # in-memory session cache
//! capacity = 1048576       # 0 disables, negative is unbounded
//! expiry_secs = 3600
//!
//! [store]                  # durable session database
//! path = "/var/lib/shiny/sessions.db"
//!
//! [logging]
//! dir = "/var/log/shiny"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shiny_types::config::defaults;
use shiny_types::{ConfigProvider, HasCacheConfig, HasStoreConfig};

use crate::error::ConfigError;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShinyConfig {
    /// Session cache configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSection>,

    /// Durable store configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSection>,

    /// Log output configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSection>,
}

impl ShinyConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        let config: ShinyConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: ShinyConfig) {
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Check values that parse but make no sense.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(cache) = &self.cache
            && cache.expiry_secs == 0
        {
            return Err(ConfigError::Invalid {
                field: "cache.expiry_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Effective cache section (defaults when absent).
    pub fn cache(&self) -> CacheSection {
        self.cache.clone().unwrap_or_default()
    }

    /// Configured log directory, if any.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.logging.as_ref().and_then(|l| l.dir.clone())
    }
}

impl ConfigProvider for ShinyConfig {}

impl HasCacheConfig for ShinyConfig {
    fn cache_capacity(&self) -> i64 {
        self.cache().capacity
    }

    fn cache_expiry(&self) -> Duration {
        self.cache().expiry()
    }
}

impl HasStoreConfig for ShinyConfig {
    fn store_path(&self) -> Option<PathBuf> {
        self.store.as_ref().and_then(|s| s.path.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Session cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Maximum cached sessions. `0` disables caching, negative is unbounded.
    pub capacity: i64,
    /// Idle seconds before a cached session is swept out.
    pub expiry_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: defaults::CACHE_CAPACITY,
            expiry_secs: defaults::CACHE_EXPIRY_SECS,
        }
    }
}

impl CacheSection {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

/// Durable store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Path to the SQLite session database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Log output configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Directory for rolling JSON log files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}
