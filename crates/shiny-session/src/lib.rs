//! Bounded write-through session cache.
//!
//! This crate holds recently used sessions in memory and keeps a durable
//! backend consistent with them:
//! - Misses fall back to the backend and admit the loaded session
//! - Every `set` is written through to the backend
//! - Idle sessions expire; the least recently accessed are evicted first
//!   when the capacity bound would be exceeded
//!
//! # Example
//!
//! ```rust,ignore
//! use shiny_session::{CacheConfig, MemoryBackend, Session, SessionCache};
//!
//! let config = CacheConfig::new()
//!     .with_capacity(1000)
//!     .with_expiry(Duration::from_secs(3600));
//!
//! let cache = SessionCache::new(config, MemoryBackend::new());
//! cache.set(&Arc::new(Session::with_id(issued_id)))?;
//! ```

mod cache;
mod clock;
mod config;
mod error;
mod persistence;
mod record;

pub use cache::{CacheStats, CompactionStats, SessionCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, Capacity, DEFAULT_CAPACITY, DEFAULT_EXPIRY};
pub use error::{Error, Result};
pub use persistence::{ExtendableBackend, MemoryBackend, PersistenceBackend};
pub use record::{Session, SessionData, UserKey};
