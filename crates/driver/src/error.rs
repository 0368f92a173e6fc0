//! Driver error types.

use thiserror::Error;

/// Errors reported across the driver boundary.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Opening or closing a connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Preparing or executing a query failed.
    #[error("query failed: {message} (query: {sql})")]
    Query { sql: String, message: String },

    /// The current row has no column with this name.
    #[error("column not found: {0}")]
    MissingColumn(String),

    /// The connection or cursor was used after being closed.
    #[error("connection closed")]
    Closed,
}

impl DriverError {
    /// Build a query error for the given query text.
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
