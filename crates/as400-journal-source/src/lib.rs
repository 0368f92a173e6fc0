//! AS400/DB2 journal-based real-time sync for journal-sync
//!
//! Uses the journal receivers of the source tables for change capture: after
//! an initial full load annotated with relative record numbers, the journal
//! is polled for record-level entries and every entry is turned into an
//! upsert or delete event.
//!
//! The source connection is supplied by the embedder through a
//! [`journal_sync_driver::Driver`].

pub mod engine;
pub mod error;
pub mod events;
pub mod journal;
pub mod query_rewriter;
pub mod settings;
pub mod snapshot_store;
pub mod state;

pub use engine::{
    run_realtime, CdcEngine, CheckpointManager, CycleOutcome, RealTimeRequest,
    DEFAULT_SNAPSHOT_BATCH_SIZE,
};
pub use error::{Result, StoreError, SyncError};
pub use events::{ChangeEvent, ChannelSink, EventSink, JsonlSink};
pub use journal::JournalEntry;
pub use query_rewriter::{QueryRewriter, DEFAULT_ROW_IDENTITY_FN};
pub use settings::{JournalInfo, RealTimeSettings};
pub use snapshot_store::{KeyColumns, LocalSnapshotStore};
pub use state::{load_job_state, DataVersions, JobState};
