use thiserror::Error;

/// Main error type for AssetGraph
#[derive(Error, Debug)]
pub enum AssetGraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encode/decode of stored payloads
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced record does not exist where existence was required
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write would duplicate an existing record or direct edge
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed or out-of-range payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Blocking task failures and other internal faults
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AssetGraphError {
    /// True when SQLite rejected the write because of a UNIQUE or PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            AssetGraphError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
}

/// Convenient Result type using AssetGraphError
pub type Result<T> = std::result::Result<T, AssetGraphError>;
