//! Catalog-specific error types.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while reading the relational catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog could not be opened. Fatal for the stage.
    #[error("catalog connection failed: {0}")]
    ConnectionFailed(String),

    /// A table or column name that is not in the introspected catalog.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// The table exists but could not be read (permissions, corruption).
    #[error("failed to read table {table}: {message}")]
    TableUnreadable {
        /// Table name.
        table: String,
        /// Driver message.
        message: String,
    },

    /// Driver-level query failure.
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// The blocking worker task panicked or was cancelled.
    #[error("catalog worker failed: {0}")]
    Worker(String),

    /// The connection mutex was poisoned by an earlier panic.
    #[error("catalog connection poisoned")]
    Poisoned,
}

impl CatalogError {
    /// Create a table-unreadable error.
    pub fn table_unreadable(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TableUnreadable {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Check if this error means no catalog access is possible at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Poisoned)
    }
}

impl From<tokio::task::JoinError> for CatalogError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}
