//! Job state and sequence tracking
//!
//! The job state is the checkpoint of a real-time read: the highest journal
//! sequence processed per journal, plus the job and shape versions the last
//! full load was performed for.

use std::collections::BTreeMap;

use checkpoint::{Checkpoint, CheckpointStore, SyncManager, SyncPhase};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::settings::RealTimeSettings;

/// Version value meaning "never loaded".
pub const NEVER_LOADED: i64 = -1;

fn never_loaded() -> i64 {
    NEVER_LOADED
}

/// Versions of the data a run is asked to replicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataVersions {
    /// Scopes the local snapshot store and persisted checkpoints.
    pub job_id: String,
    pub job_version: i64,
    pub shape_version: i64,
}

impl DataVersions {
    pub fn new(job_id: impl Into<String>, job_version: i64, shape_version: i64) -> Self {
        Self {
            job_id: job_id.into(),
            job_version,
            shape_version,
        }
    }
}

/// Durable state of one real-time read job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    /// Highest processed sequence per journal alias.
    #[serde(default, alias = "LastJournalEntryIdMap")]
    pub last_journal_entry_id_map: BTreeMap<String, u64>,

    #[serde(default = "never_loaded", alias = "JobVersion")]
    pub job_version: i64,

    #[serde(default = "never_loaded", alias = "ShapeVersion")]
    pub shape_version: i64,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            last_journal_entry_id_map: BTreeMap::new(),
            job_version: NEVER_LOADED,
            shape_version: NEVER_LOADED,
        }
    }
}

impl JobState {
    /// Parse a state from JSON. Blank input yields a fresh state.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| SyncError::State(format!("invalid job state: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SyncError::State(e.to_string()))
    }

    /// Whether a full load is required for the given versions.
    ///
    /// Only strictly newer versions trigger a reload, so reconnecting with the
    /// same versions resumes from the tracked sequences.
    pub fn needs_full_reload(&self, job_version: i64, shape_version: i64) -> bool {
        job_version > self.job_version || shape_version > self.shape_version
    }

    /// Journal aliases of the settings that have no tracked sequence yet.
    pub fn missing_journals(&self, settings: &RealTimeSettings) -> Vec<String> {
        settings
            .journal_aliases()
            .into_iter()
            .filter(|alias| !self.last_journal_entry_id_map.contains_key(alias))
            .collect()
    }

    /// Last processed sequence of a journal, 0 when untracked.
    pub fn last_sequence(&self, journal_alias: &str) -> u64 {
        self.last_journal_entry_id_map
            .get(journal_alias)
            .copied()
            .unwrap_or(0)
    }

    /// Raise the tracked sequence of a journal to `candidate`.
    ///
    /// The tracked value never decreases. Returns whether it changed.
    pub fn record_max_sequence(&mut self, journal_alias: &str, candidate: u64) -> bool {
        match self.last_journal_entry_id_map.get_mut(journal_alias) {
            Some(current) if *current >= candidate => false,
            Some(current) => {
                *current = candidate;
                true
            }
            None => {
                self.last_journal_entry_id_map
                    .insert(journal_alias.to_string(), candidate);
                true
            }
        }
    }

    /// Record the versions a full load was performed for.
    pub fn set_versions(&mut self, job_version: i64, shape_version: i64) {
        self.job_version = job_version;
        self.shape_version = shape_version;
    }

    /// Copy of the state for checkpointing.
    pub fn snapshot(&self) -> JobState {
        self.clone()
    }
}

impl Checkpoint for JobState {
    const SOURCE_TYPE: &'static str = "as400-journal";

    fn to_cli_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        Ok(Self::from_json(s)?)
    }
}

/// Load the newest persisted job state of a job, if any.
///
/// Whichever of the full-load and poll-cycle checkpoints was written last is
/// the one to resume from.
pub async fn load_job_state<S: CheckpointStore>(
    manager: &SyncManager<S>,
) -> anyhow::Result<Option<JobState>> {
    let latest: Option<(SyncPhase, JobState)> = manager.read_latest_checkpoint().await?;
    Ok(latest.map(|(phase, state)| {
        tracing::info!(
            "Resuming job '{}' from {} checkpoint: {}",
            manager.job_id(),
            phase,
            state.to_cli_string()
        );
        state
    }))
}
