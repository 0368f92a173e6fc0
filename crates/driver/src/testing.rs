//! Scripted in-memory driver.
//!
//! Responses are registered per exact query text. A query with no registered
//! response yields an empty result set, which is also how "row no longer
//! exists" is simulated for row lookups.
//!
//! ```rust
//! use journal_sync_driver::testing::{row, MemoryDriver};
//!
//! let driver = MemoryDriver::new();
//! driver.respond("SELECT A FROM T", vec![row([("A", 1i64)])]);
//! driver.fail_on("SELECT B FROM T");
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sync_core::SourceValue;
use tracing::debug;

use crate::{Command, Connection, Driver, DriverError, Result, RowCursor};

/// A result row: column names with their values, in column order.
pub type MemoryRow = Vec<(String, SourceValue)>;

/// Build a [`MemoryRow`] from column/value pairs.
pub fn row<I, K, V>(columns: I) -> MemoryRow
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<SourceValue>,
{
    columns
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Default)]
struct MemoryState {
    responses: HashMap<String, Vec<MemoryRow>>,
    one_shot: HashMap<String, VecDeque<Vec<MemoryRow>>>,
    failures: HashSet<String>,
    fail_open: bool,
    executed: Vec<String>,
    opened: usize,
    closed: usize,
}

/// In-memory [`Driver`] whose behaviour is scripted by the test.
///
/// Clones share the same script, so a test can keep a handle and change the
/// script while an engine runs against another clone.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    /// Return `rows` every time `sql` is executed.
    pub fn respond(&self, sql: impl Into<String>, rows: Vec<MemoryRow>) {
        self.lock().responses.insert(sql.into(), rows);
    }

    /// Return `rows` the next time `sql` is executed only. One-shot responses
    /// queue up and take precedence over [`respond`](Self::respond).
    pub fn respond_once(&self, sql: impl Into<String>, rows: Vec<MemoryRow>) {
        self.lock()
            .one_shot
            .entry(sql.into())
            .or_default()
            .push_back(rows);
    }

    /// Make every execution of `sql` fail.
    pub fn fail_on(&self, sql: impl Into<String>) {
        self.lock().failures.insert(sql.into());
    }

    /// Stop failing `sql`.
    pub fn clear_failure(&self, sql: &str) {
        self.lock().failures.remove(sql);
    }

    /// Make [`Driver::open_connection`] fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    /// Every query text executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Number of times `sql` was executed.
    pub fn execution_count(&self, sql: &str) -> usize {
        self.lock().executed.iter().filter(|q| *q == sql).count()
    }

    /// Number of connections opened.
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Number of connections closed.
    pub fn closed(&self) -> usize {
        self.lock().closed
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn open_connection(&self) -> Result<Box<dyn Connection>> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(DriverError::Connection(
                "memory driver configured to refuse connections".to_string(),
            ));
        }
        state.opened += 1;
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn prepare(&self, sql: &str) -> Result<Box<dyn Command>> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        Ok(Box::new(MemoryCommand {
            state: Arc::clone(&self.state),
            sql: sql.to_string(),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.closed = true;
        lock(&self.state).closed += 1;
        Ok(())
    }
}

struct MemoryCommand {
    state: Arc<Mutex<MemoryState>>,
    sql: String,
}

#[async_trait]
impl Command for MemoryCommand {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn execute_query(&mut self) -> Result<Box<dyn RowCursor>> {
        let mut state = lock(&self.state);
        state.executed.push(self.sql.clone());
        debug!("memory driver executing: {}", self.sql);

        if state.failures.contains(&self.sql) {
            return Err(DriverError::query(&self.sql, "scripted failure"));
        }

        let one_shot = state
            .one_shot
            .get_mut(&self.sql)
            .and_then(|queue| queue.pop_front());
        let rows = match one_shot {
            Some(rows) => rows,
            None => state.responses.get(&self.sql).cloned().unwrap_or_default(),
        };

        Ok(Box::new(MemoryCursor {
            rows: rows.into(),
            current: None,
        }))
    }
}

struct MemoryCursor {
    rows: VecDeque<MemoryRow>,
    current: Option<MemoryRow>,
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn next(&mut self) -> Result<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn value(&self, column: &str) -> Result<SourceValue> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| DriverError::query("", "cursor is not positioned on a row"))?;
        current
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| DriverError::MissingColumn(column.to_string()))
    }
}
