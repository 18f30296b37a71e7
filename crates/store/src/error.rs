use thiserror::Error;

/// Errors that can occur when interacting with a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored column held a value the domain does not recognize.
    #[error("Invalid value in column {column}: {value}")]
    InvalidColumn { column: String, value: String },

    /// A record that was expected to exist is missing (in-memory fault
    /// injection uses this to simulate store unavailability).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
