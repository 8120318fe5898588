//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur in the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Could not prepare the database location.
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Invalid data or state.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<StoreError> for shiny_session::Error {
    fn from(e: StoreError) -> Self {
        shiny_session::Error::Persistence(e.to_string())
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
