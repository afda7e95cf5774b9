//! Database error types.

use thiserror::Error;

/// Database error type.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Executor thread or connection lifecycle error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store rejected the supplied key
    #[error("Failed to unlock database: {0}")]
    Keying(String),

    /// Migration error
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data error
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using DatabaseError.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Schema migration failures. The store is left at the last version whose
/// step applied and validated.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Reading or writing the schema version failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A step's apply or validate hit a SQL error; its transaction was rolled back
    #[error("Migration v{version} ({description}) failed: {source}")]
    Step {
        version: u32,
        description: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A step applied but its structural checks did not hold
    #[error("Migration v{version} ({description}) failed validation")]
    Validation { version: u32, description: String },

    /// Requested version is newer than any registered step
    #[error("Unknown target schema version {target} (newest known is {latest})")]
    UnknownTarget { target: u32, latest: u32 },

    /// Steps are not strictly ascending
    #[error("Invalid migration registry: {0}")]
    InvalidRegistry(String),
}

/// Result type alias using MigrationError.
pub type MigrationResult<T> = Result<T, MigrationError>;
