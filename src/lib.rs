//! journal-sync library
//!
//! Replicates tables of a journaled AS400/DB2 source as an ordered stream of
//! upsert, delete and state-commit events.
//!
//! # Crates
//!
//! - `sync_core` - shapes, property types and source values
//! - `checkpoint` - persisted job state
//! - `journal_sync_driver` - the source connection boundary
//! - `journal_sync_as400_journal_source` - the real-time read engine
//!
//! The engine needs a concrete [`journal_sync_driver::Driver`]; embedders call
//! [`as400::run_realtime`] with theirs. The CLI works offline and inspects
//! what a job would do or has left behind.
//!
//! # CLI Usage
//!
//! ```bash
//! # Print the queries a job issues
//! journal-sync queries --settings settings.json --shape shape.yaml
//!
//! # Print the newest persisted state of a job
//! journal-sync state --checkpoint-dir .journal-sync-checkpoints --job-id job-1
//! ```

pub mod config;
pub mod inspect;

pub use journal_sync_as400_journal_source as as400;

use clap::Parser;

/// Options identifying a job and where it keeps its state.
#[derive(Parser, Clone, Debug)]
pub struct JobOpts {
    /// Job id; scopes checkpoints and the local snapshot store
    #[arg(long, env = "JOURNAL_SYNC_JOB_ID")]
    pub job_id: String,

    /// Directory holding checkpoint files
    #[arg(long, default_value = ".journal-sync-checkpoints")]
    pub checkpoint_dir: std::path::PathBuf,
}
