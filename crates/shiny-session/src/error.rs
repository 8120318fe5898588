//! Error types for session cache operations.

/// Error type for session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A session was handed to the cache before it was given an identifier.
    #[error("Session has no identifier")]
    MissingIdentifier,

    /// A session identifier may only be assigned once.
    #[error("Session identifier already assigned: {current} (requested {requested})")]
    IdentifierReassigned { current: String, requested: String },

    /// Error from persistence backend.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;
