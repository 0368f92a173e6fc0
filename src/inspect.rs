//! Offline inspection of a real-time read job
//!
//! Everything here works without a source connection: it derives the queries
//! a job would issue and reads the state the job left behind.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use checkpoint::{FilesystemStore, SyncManager};
use journal_sync_as400_journal_source::journal::{journal_query, max_sequence_query};
use journal_sync_as400_journal_source::{
    load_job_state, JobState, LocalSnapshotStore, QueryRewriter, RealTimeSettings,
};
use serde::Serialize;
use sync_core::Shape;

/// The queries a job issues against the source.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub load_query: String,
    pub max_sequence_queries: Vec<String>,
    /// One per table, after the given sequence.
    pub journal_queries: Vec<String>,
    /// One per table, for the given row identity.
    pub row_lookup_queries: Vec<String>,
}

/// Derive the queries of a job.
pub fn plan_queries(
    settings: &RealTimeSettings,
    shape: &Shape,
    rewriter: &QueryRewriter,
    after_sequence: u64,
    sample_identity: &str,
) -> anyhow::Result<QueryPlan> {
    settings.validate()?;
    rewriter.validate(&shape.query)?;

    let load_query = rewriter.build_load_query(&shape.query, &settings.table_information)?;
    let max_sequence_queries = settings
        .journals()
        .into_iter()
        .map(|(_, library, name)| max_sequence_query(library, name))
        .collect();
    let journal_queries = settings
        .table_information
        .iter()
        .map(|table| journal_query(table, after_sequence))
        .collect();
    let row_lookup_queries = settings
        .table_information
        .iter()
        .map(|table| {
            rewriter.build_row_lookup_query(&shape.query, &table.table_alias(), sample_identity)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryPlan {
        load_query,
        max_sequence_queries,
        journal_queries,
        row_lookup_queries,
    })
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- load query")?;
        writeln!(f, "{};", self.load_query)?;
        for query in &self.max_sequence_queries {
            writeln!(f, "\n-- journal end")?;
            writeln!(f, "{query};")?;
        }
        for query in &self.journal_queries {
            writeln!(f, "\n-- journal entries")?;
            writeln!(f, "{query};")?;
        }
        for query in &self.row_lookup_queries {
            writeln!(f, "\n-- row lookup")?;
            writeln!(f, "{query};")?;
        }
        Ok(())
    }
}

/// Newest persisted state of a job.
pub async fn read_job_state(
    checkpoint_dir: impl AsRef<Path>,
    job_id: &str,
) -> anyhow::Result<Option<JobState>> {
    let manager = SyncManager::new(FilesystemStore::new(checkpoint_dir.as_ref()), job_id);
    load_job_state(&manager).await
}

/// Whether the next start of a job performs a full load, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadDecision {
    pub full_load: bool,
    pub reasons: Vec<String>,
}

/// Decide whether a job starting with `state` performs a full load.
pub fn reload_decision(
    state: &JobState,
    job_version: i64,
    shape_version: i64,
    settings: Option<&RealTimeSettings>,
) -> ReloadDecision {
    let mut reasons = Vec::new();
    if job_version > state.job_version {
        reasons.push(format!(
            "job version {job_version} is newer than {}",
            state.job_version
        ));
    }
    if shape_version > state.shape_version {
        reasons.push(format!(
            "shape version {shape_version} is newer than {}",
            state.shape_version
        ));
    }
    let missing = settings
        .map(|settings| state.missing_journals(settings))
        .unwrap_or_default();
    for alias in &missing {
        reasons.push(format!("journal {alias} has no tracked sequence"));
    }
    ReloadDecision {
        full_load: state.needs_full_reload(job_version, shape_version) || !missing.is_empty(),
        reasons,
    }
}

/// Summary of a job's local snapshot store, or one record of it.
pub fn inspect_snapshot(
    store_dir: impl AsRef<Path>,
    job_id: &str,
    record_id: Option<&str>,
) -> anyhow::Result<serde_json::Value> {
    let path = LocalSnapshotStore::job_path(store_dir.as_ref(), job_id);
    if !path.exists() {
        anyhow::bail!("No local snapshot store at {}", path.display());
    }
    let store = LocalSnapshotStore::open_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let value = match record_id {
        Some(id) => serde_json::json!({
            "id": id,
            "keyColumns": store.get(id)?,
        }),
        None => serde_json::json!({
            "path": path.display().to_string(),
            "records": store.len()?,
        }),
    };
    Ok(value)
}
