//! Configuration for the session cache.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::TimeDelta;
use shiny_types::{HasCacheConfig, config_defaults};

/// Default maximum number of sessions to cache.
pub const DEFAULT_CAPACITY: Capacity = Capacity::Bounded(match NonZeroUsize::new(1024 * 1024) {
    Some(n) => n,
    None => unreachable!(),
});

/// Default idle time before a cached session is swept out.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(config_defaults::CACHE_EXPIRY_SECS);

/// How many sessions the cache may hold in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// Nothing is cached; every call goes straight to the backend.
    Disabled,
    /// At most this many entries after every `set`.
    Bounded(NonZeroUsize),
    /// No capacity eviction; only expiry removes entries.
    Unbounded,
}

impl Capacity {
    /// Whether sessions are retained in memory at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Capacity::Disabled)
    }

    /// The hard bound, if there is one. `Disabled` is a bound of zero.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Disabled => Some(0),
            Capacity::Bounded(n) => Some(n.get()),
            Capacity::Unbounded => None,
        }
    }
}

impl From<i64> for Capacity {
    /// `0` disables, negative values are unbounded.
    fn from(value: i64) -> Self {
        match usize::try_from(value) {
            Ok(n) => NonZeroUsize::new(n).map_or(Capacity::Disabled, Capacity::Bounded),
            Err(_) if value < 0 => Capacity::Unbounded,
            Err(_) => Capacity::Bounded(NonZeroUsize::MAX),
        }
    }
}

impl From<Capacity> for i64 {
    fn from(capacity: Capacity) -> Self {
        match capacity {
            Capacity::Disabled => 0,
            Capacity::Bounded(n) => i64::try_from(n.get()).unwrap_or(i64::MAX),
            Capacity::Unbounded => -1,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Disabled => f.write_str("disabled"),
            Capacity::Bounded(n) => write!(f, "{n}"),
            Capacity::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Configuration for the session cache.
///
/// Read once when the cache is built.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached sessions.
    pub capacity: Capacity,

    /// Maximum idle time before a cached session is considered stale.
    pub expiry: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            expiry: DEFAULT_EXPIRY,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from any provider of cache settings.
    pub fn from_provider<C: HasCacheConfig>(config: &C) -> Self {
        Self {
            capacity: Capacity::from(config.cache_capacity()),
            expiry: config.cache_expiry(),
        }
    }

    /// Set the capacity.
    pub fn with_capacity(mut self, capacity: impl Into<Capacity>) -> Self {
        self.capacity = capacity.into();
        self
    }

    /// Set the idle expiry.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// Expiry as a signed delta for comparison against access stamps.
    ///
    /// `None` when the duration is too large to represent, meaning nothing
    /// ever expires.
    pub(crate) fn expiry_delta(&self) -> Option<TimeDelta> {
        TimeDelta::from_std(self.expiry).ok()
    }
}
