//! SQLite persistence backend for the Shiny session cache.
//!
//! Sessions are stored as JSON payloads keyed by identifier, with the owning
//! user and access times pulled out into indexed columns for lookups and
//! durable-side cleanup.

mod error;
mod store;

pub use error::{Result, StoreError};
pub use store::{SqliteBackend, StoredSession, default_store_path};
