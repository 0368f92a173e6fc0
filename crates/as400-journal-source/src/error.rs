//! Error types for the journal source.

use journal_sync_driver::DriverError;
use thiserror::Error;

/// Errors raised while replicating a journaled source.
///
/// Only `QueryExecution` and `MissingColumn` are recovered inside the poll
/// loop; everything else aborts the run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed settings, shape or base query.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Opening or closing the source connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] DriverError),

    /// A load, journal or row-lookup query failed.
    #[error("query execution failed: {0}")]
    QueryExecution(#[source] DriverError),

    /// A declared property has no matching column in a result row.
    #[error("no column for property: {0}")]
    MissingColumn(String),

    /// The local snapshot store failed.
    #[error("local snapshot store error: {0}")]
    Store(#[from] StoreError),

    /// Writing to the event sink failed.
    #[error("event sink error: {0}")]
    Sink(String),

    /// Job state could not be read or written.
    #[error("job state error: {0}")]
    State(String),
}

impl SyncError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Errors raised by the local snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for journal source operations.
pub type Result<T> = std::result::Result<T, SyncError>;
