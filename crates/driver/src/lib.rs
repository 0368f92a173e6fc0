//! Driver boundary for journal-sync
//!
//! The replication engine never talks to a wire protocol directly. It opens a
//! [`Connection`] through a [`Driver`], prepares a [`Command`] per query text
//! and walks the forward-only [`RowCursor`] it returns.
//!
//! Concrete drivers (ODBC, DB2 CLI, ...) live with the embedding application.
//! [`testing::MemoryDriver`] is a scripted in-memory driver for tests.

mod error;
pub mod testing;

pub use error::{DriverError, Result};

use async_trait::async_trait;
use sync_core::SourceValue;

/// Factory for source connections.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection to the source.
    async fn open_connection(&self) -> Result<Box<dyn Connection>>;
}

/// An open connection to the source.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Prepare a query for execution on this connection.
    async fn prepare(&self, sql: &str) -> Result<Box<dyn Command>>;

    /// Close the connection. Further use fails with [`DriverError::Closed`].
    async fn close(&mut self) -> Result<()>;
}

/// A prepared query.
#[async_trait]
pub trait Command: Send + Sync {
    /// Query text this command was prepared from.
    fn sql(&self) -> &str;

    /// Execute the query and return a cursor positioned before the first row.
    async fn execute_query(&mut self) -> Result<Box<dyn RowCursor>>;
}

/// Forward-only cursor over a result set.
#[async_trait]
pub trait RowCursor: Send + Sync {
    /// Advance to the next row. Returns false once the result set is exhausted.
    async fn next(&mut self) -> Result<bool>;

    /// Read a column of the current row.
    ///
    /// Returns [`DriverError::MissingColumn`] when the result set has no such
    /// column.
    fn value(&self, column: &str) -> Result<SourceValue>;
}
