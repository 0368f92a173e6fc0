//! Real-time read engine
//!
//! ```text
//! Uninitialized ──> FullLoad ──> PollCycle ──> sleep ──┐
//!        │                          ^                  │
//!        └──────────────────────────┴──────────────────┘
//!                                 Cancelled | Fatal
//! ```
//!
//! A full load runs when the job or shape version is newer than the one in
//! the job state, or when a monitored journal has no tracked sequence yet.
//! It reads every row of the base query annotated with row identities,
//! remembers their key columns in the local snapshot store and records the
//! current end of every journal. Poll cycles then walk the journal entries
//! of each table after the tracked sequence and turn them into upserts and
//! deletes.
//!
//! Query failures inside a poll cycle abandon the current table until the
//! next cycle; every other failure ends the run.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use checkpoint::{CheckpointStore, SyncManager, SyncPhase};
use journal_sync_driver::{Connection, Driver, RowCursor};
use serde_json::{Map, Value};
use sync_core::Shape;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{Result, SyncError};
use crate::events::{ChangeEvent, EventSink};
use crate::journal::{self, JournalEntry};
use crate::query_rewriter::QueryRewriter;
use crate::settings::{JournalInfo, RealTimeSettings};
use crate::snapshot_store::{KeyColumns, LocalSnapshotStore};
use crate::state::{load_job_state, DataVersions, JobState};

/// Snapshot records written per store transaction during a full load.
pub const DEFAULT_SNAPSHOT_BATCH_SIZE: usize = 500;

/// Checkpoint manager used by the engine.
pub type CheckpointManager = SyncManager<Box<dyn CheckpointStore>>;

/// How a poll cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every table was polled and the state committed.
    Completed,
    /// Cancellation was observed before a table pass.
    Cancelled,
}

/// Replicates one shape from a journaled source.
pub struct CdcEngine<K: EventSink> {
    settings: RealTimeSettings,
    shape: Shape,
    versions: DataVersions,
    rewriter: QueryRewriter,
    store: LocalSnapshotStore,
    sink: K,
    checkpoints: Option<CheckpointManager>,
    state: JobState,
    polling_interval: Duration,
    snapshot_batch_size: usize,
    event_count: u64,
}

impl<K: EventSink> CdcEngine<K> {
    pub fn new(
        settings: RealTimeSettings,
        shape: Shape,
        versions: DataVersions,
        store: LocalSnapshotStore,
        sink: K,
    ) -> Self {
        let polling_interval = settings.polling_interval();
        Self {
            settings,
            shape,
            versions,
            rewriter: QueryRewriter::default(),
            store,
            sink,
            checkpoints: None,
            state: JobState::default(),
            polling_interval,
            snapshot_batch_size: DEFAULT_SNAPSHOT_BATCH_SIZE,
            event_count: 0,
        }
    }

    /// Use a different row identity dialect.
    pub fn with_rewriter(mut self, rewriter: QueryRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Resume from a previously committed job state.
    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    /// Also persist every state commit through a checkpoint manager.
    pub fn with_checkpoints(mut self, manager: CheckpointManager) -> Self {
        self.checkpoints = Some(manager);
        self
    }

    /// Override the polling interval of the settings.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Number of full-load snapshot records per store transaction (at least 1).
    pub fn with_snapshot_batch_size(mut self, size: usize) -> Self {
        self.snapshot_batch_size = size.max(1);
        self
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn store(&self) -> &LocalSnapshotStore {
        &self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Upserts and deletes written so far.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Check settings and base query before anything is opened.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.rewriter.validate(&self.shape.query)
    }

    /// Whether starting now performs a full load.
    pub fn needs_full_load(&self) -> bool {
        self.state
            .needs_full_reload(self.versions.job_version, self.versions.shape_version)
            || !self.state.missing_journals(&self.settings).is_empty()
    }

    /// Run until cancelled or a fatal error occurs.
    ///
    /// Returns the number of upserts and deletes written. Cancellation is
    /// not an error.
    pub async fn run(&mut self, driver: &dyn Driver, cancel: &CancellationToken) -> Result<u64> {
        let span = info_span!("realtime_read", job_id = %self.versions.job_id);
        self.run_inner(driver, cancel).instrument(span).await
    }

    async fn run_inner(&mut self, driver: &dyn Driver, cancel: &CancellationToken) -> Result<u64> {
        info!("Beginning to read records real time...");
        self.validate()?;

        let mut conn = driver
            .open_connection()
            .await
            .map_err(SyncError::Connection)?;

        let result = self.run_with_connection(conn.as_ref(), cancel).await;

        match conn.close().await {
            Ok(()) => {}
            Err(e) if result.is_ok() => return Err(SyncError::Connection(e)),
            Err(e) => warn!("Failed to close connection after error: {e}"),
        }

        match &result {
            Ok(count) => info!("Real time read stopped after {count} events"),
            Err(e) => error!("Real time read failed: {e}"),
        }
        result
    }

    async fn run_with_connection(
        &mut self,
        conn: &dyn Connection,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if self.needs_full_load() {
            self.full_load(conn).await?;
        }
        info!("Real time read initialized.");

        loop {
            if self.poll_cycle(conn, cancel).await? == CycleOutcome::Cancelled {
                info!("Operation cancelled before table pass");
                break;
            }
            if sleep_or_cancel(self.polling_interval, cancel).await {
                info!("Operation cancelled during polling interval");
                break;
            }
        }

        Ok(self.event_count)
    }

    /// Reload every row and reset the journal positions.
    pub async fn full_load(&mut self, conn: &dyn Connection) -> Result<()> {
        info!(
            "Full load for job version {} and shape version {}",
            self.versions.job_version, self.versions.shape_version
        );

        self.store.clear()?;

        let load_query = self
            .rewriter
            .build_load_query(&self.shape.query, &self.settings.table_information)?;
        let mut cursor = execute(conn, &load_query).await?;

        let tables = self.settings.table_information.clone();
        let mut rows = 0u64;
        let mut pending: Vec<(String, KeyColumns)> = Vec::with_capacity(self.snapshot_batch_size);
        while cursor.next().await.map_err(SyncError::QueryExecution)? {
            let (data, keys) = self.project_row(cursor.as_ref());

            for table in &tables {
                let table_key = table.table_key();
                match cursor.value(&table_key) {
                    Ok(identity) if !identity.is_null() => {
                        let record_id = table.record_id(&identity.to_identity_string());
                        pending.push((record_id, keys.clone()));
                    }
                    Ok(_) => debug!("Row has no identity for {table_key}"),
                    Err(e) => warn!("No column with property Id: {table_key}: {e}"),
                }
            }

            if pending.len() >= self.snapshot_batch_size {
                self.flush_snapshot(&mut pending)?;
            }

            self.emit(ChangeEvent::upsert(&data)).await?;
            rows += 1;
        }
        drop(cursor);
        self.flush_snapshot(&mut pending)?;
        info!("Loaded {rows} rows");

        for (alias, library, name) in self.settings.journals() {
            let max_sequence = max_sequence(conn, library, name).await?;
            debug!("Journal {alias} ends at sequence {max_sequence}");
            self.state.record_max_sequence(&alias, max_sequence);
        }

        self.state
            .set_versions(self.versions.job_version, self.versions.shape_version);
        self.commit_state(SyncPhase::FullLoad).await?;

        debug!("Got all records for reload");
        Ok(())
    }

    fn flush_snapshot(&self, pending: &mut Vec<(String, KeyColumns)>) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        self.store
            .upsert_many(pending.iter().map(|(id, keys)| (id.as_str(), keys)))?;
        pending.clear();
        Ok(())
    }

    /// Poll every monitored table once and commit the resulting state.
    pub async fn poll_cycle(
        &mut self,
        conn: &dyn Connection,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome> {
        debug!(
            "Getting all records after sequence {:?}",
            self.state.last_journal_entry_id_map
        );

        // Tables sharing a journal all read from where the cycle started
        let cycle_start = self.state.last_journal_entry_id_map.clone();
        let tables = self.settings.table_information.clone();
        let mut cycle_events = 0u64;

        for table in &tables {
            if cancel.is_cancelled() {
                return Ok(CycleOutcome::Cancelled);
            }

            let before = self.event_count;
            match self.poll_table(conn, table, &cycle_start).await {
                Ok(()) => {}
                Err(SyncError::QueryExecution(e)) => {
                    error!(
                        "Abandoning {} for this cycle: {e}",
                        table.table_key()
                    );
                }
                Err(e) => return Err(e),
            }
            cycle_events += self.event_count - before;

            self.sink
                .flush()
                .await
                .map_err(|e| SyncError::Sink(format!("{e:#}")))?;
        }

        self.commit_state(SyncPhase::PollCycle).await?;

        info!(
            "Got all records up to sequence {:?} ({cycle_events} events)",
            self.state.last_journal_entry_id_map
        );
        Ok(CycleOutcome::Completed)
    }

    async fn poll_table(
        &mut self,
        conn: &dyn Connection,
        table: &JournalInfo,
        cycle_start: &BTreeMap<String, u64>,
    ) -> Result<()> {
        let journal_alias = table.journal_alias();
        let after = cycle_start.get(&journal_alias).copied().unwrap_or(0);
        debug!("Getting all records after sequence {journal_alias} {after}");

        let query = journal::journal_query(table, after);
        let mut cursor = execute(conn, &query).await?;

        while cursor.next().await.map_err(SyncError::QueryExecution)? {
            let entry =
                JournalEntry::from_cursor(cursor.as_ref()).map_err(SyncError::QueryExecution)?;
            if entry.sequence <= after {
                debug!("Skipping already processed entry {}", entry.sequence);
                continue;
            }

            self.state
                .record_max_sequence(&journal_alias, entry.sequence);

            let record_id = entry.record_id();
            if entry.is_delete() {
                self.apply_delete(&record_id).await?;
            } else {
                self.apply_upsert(conn, table, &entry, &record_id).await?;
            }
        }

        Ok(())
    }

    async fn apply_delete(&mut self, record_id: &str) -> Result<()> {
        match self.store.get(record_id)? {
            Some(keys) => {
                info!("Deleting record {record_id}");
                self.store.delete(record_id)?;
                self.emit(ChangeEvent::delete(&keys)).await
            }
            None => {
                debug!("Delete of unknown record {record_id}, nothing to report");
                Ok(())
            }
        }
    }

    async fn apply_upsert(
        &mut self,
        conn: &dyn Connection,
        table: &JournalInfo,
        entry: &JournalEntry,
        record_id: &str,
    ) -> Result<()> {
        info!("Upserting record {record_id}");

        let query = self.rewriter.build_row_lookup_query(
            &self.shape.query,
            &table.table_alias(),
            &entry.row_identity,
        )?;
        let mut cursor = execute(conn, &query).await?;

        let mut found = false;
        while cursor.next().await.map_err(SyncError::QueryExecution)? {
            found = true;
            let (data, keys) = self.project_row(cursor.as_ref());
            self.store.upsert(record_id, &keys)?;
            self.emit(ChangeEvent::upsert(&data)).await?;
        }
        if !found {
            debug!("Record {record_id} no longer exists");
        }
        Ok(())
    }

    /// Project the declared properties of the current row, returning the
    /// payload and the key columns.
    fn project_row(&self, cursor: &dyn RowCursor) -> (Map<String, Value>, KeyColumns) {
        let mut data = Map::new();
        let mut keys = KeyColumns::new();

        for property in &self.shape.properties {
            match cursor.value(property.column_name()) {
                Ok(value) => {
                    let projected = value.project(property.property_type);
                    if property.is_key {
                        keys.insert(property.id.clone(), projected.clone());
                    }
                    data.insert(property.id.clone(), projected);
                }
                Err(e) => {
                    warn!("{}: {e}", SyncError::MissingColumn(property.id.clone()));
                    data.insert(property.id.clone(), Value::Null);
                }
            }
        }

        (data, keys)
    }

    async fn emit(&mut self, event: ChangeEvent) -> Result<()> {
        if !event.is_state_commit() {
            self.event_count += 1;
        }
        self.sink
            .write(event)
            .await
            .map_err(|e| SyncError::Sink(format!("{e:#}")))
    }

    async fn commit_state(&mut self, phase: SyncPhase) -> Result<()> {
        let state = self.state.snapshot();
        self.emit(ChangeEvent::state_commit(&state)?).await?;
        self.sink
            .flush()
            .await
            .map_err(|e| SyncError::Sink(format!("{e:#}")))?;

        if let Some(manager) = &self.checkpoints {
            manager
                .emit_checkpoint(&state, phase)
                .await
                .map_err(|e| SyncError::State(format!("{e:#}")))?;
        }
        Ok(())
    }
}

async fn execute(conn: &dyn Connection, sql: &str) -> Result<Box<dyn RowCursor>> {
    debug!("Executing: {sql}");
    let mut command = conn.prepare(sql).await.map_err(SyncError::QueryExecution)?;
    command
        .execute_query()
        .await
        .map_err(SyncError::QueryExecution)
}

async fn max_sequence(conn: &dyn Connection, library: &str, name: &str) -> Result<u64> {
    let query = journal::max_sequence_query(library, name);
    let mut cursor = execute(conn, &query).await?;
    if !cursor.next().await.map_err(SyncError::QueryExecution)? {
        return Ok(0);
    }
    let value = cursor
        .value(journal::MAX_SEQUENCE_COLUMN)
        .map_err(SyncError::QueryExecution)?;
    if value.is_null() {
        return Ok(0);
    }
    value.as_u64().ok_or_else(|| {
        SyncError::QueryExecution(journal_sync_driver::DriverError::query(
            query,
            format!("max sequence is not an unsigned integer: {value}"),
        ))
    })
}

/// Sleep for `interval`. Returns true if cancelled first.
async fn sleep_or_cancel(interval: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

/// Everything a real-time read needs besides the driver and the sink.
#[derive(Debug, Clone)]
pub struct RealTimeRequest {
    pub settings: RealTimeSettings,
    pub shape: Shape,
    pub versions: DataVersions,
    /// State to resume from. When absent, the newest persisted checkpoint is
    /// used, then a fresh state.
    pub state: Option<JobState>,
    /// Root directory of job-scoped local stores.
    pub permanent_path: PathBuf,
    pub rewriter: QueryRewriter,
}

/// Run a real-time read until `cancel` fires.
///
/// Returns the number of upserts and deletes written.
pub async fn run_realtime<K: EventSink>(
    driver: &dyn Driver,
    request: RealTimeRequest,
    sink: K,
    checkpoints: Option<CheckpointManager>,
    cancel: CancellationToken,
) -> Result<u64> {
    request.settings.validate()?;
    request.rewriter.validate(&request.shape.query)?;

    let state = match (request.state, &checkpoints) {
        (Some(state), _) => state,
        (None, Some(manager)) => load_job_state(manager)
            .await
            .map_err(|e| SyncError::State(format!("{e:#}")))?
            .unwrap_or_default(),
        (None, None) => JobState::default(),
    };

    let store = LocalSnapshotStore::open(&request.permanent_path, &request.versions.job_id)?;
    let mut engine = CdcEngine::new(
        request.settings,
        request.shape,
        request.versions,
        store,
        sink,
    )
    .with_rewriter(request.rewriter)
    .with_state(state);
    if let Some(manager) = checkpoints {
        engine = engine.with_checkpoints(manager);
    }

    engine.run(driver, &cancel).await
}
