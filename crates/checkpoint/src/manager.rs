//! Generic sync manager for checkpoint operations.

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    store::CheckpointStore, Checkpoint, CheckpointFile, CheckpointID, StoredCheckpoint, SyncPhase,
};

/// Manager for handling checkpoint persistence of one job.
///
/// # Example
///
/// ```rust,ignore
/// use checkpoint::{FilesystemStore, SyncManager, SyncPhase};
///
/// let manager = SyncManager::new(FilesystemStore::new("/tmp/checkpoints"), "job-1");
///
/// manager.emit_checkpoint(&state, SyncPhase::PollCycle).await?;
///
/// let latest: Option<(SyncPhase, JobState)> = manager.read_latest_checkpoint().await?;
/// ```
pub struct SyncManager<S: CheckpointStore> {
    store: S,
    job_id: String,
}

impl<S: CheckpointStore> SyncManager<S> {
    /// Create a new sync manager for a job.
    pub fn new(store: S, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }

    /// Job this manager persists checkpoints for.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn id_for<C: Checkpoint>(&self, phase: SyncPhase) -> CheckpointID {
        CheckpointID {
            source_type: C::SOURCE_TYPE.to_string(),
            job_id: self.job_id.clone(),
            phase: phase.as_str().to_string(),
        }
    }

    /// Emit checkpoint for any source-specific checkpoint type.
    ///
    /// This is a **SAVING** operation; it replaces the previous checkpoint of
    /// the same phase.
    pub async fn emit_checkpoint<C: Checkpoint>(
        &self,
        checkpoint: &C,
        phase: SyncPhase,
    ) -> Result<()> {
        let id = self.id_for::<C>(phase);
        let checkpoint_data = serde_json::to_string(checkpoint)?;
        self.store.store_checkpoint(&id, checkpoint_data).await?;

        tracing::debug!(
            "Stored {} checkpoint for job '{}': {}",
            phase,
            self.job_id,
            checkpoint.to_cli_string()
        );

        Ok(())
    }

    /// Read the checkpoint file of one phase, if any.
    pub async fn read_checkpoint_file<C: Checkpoint>(
        &self,
        phase: SyncPhase,
    ) -> Result<Option<CheckpointFile>> {
        let id = self.id_for::<C>(phase);
        match self.store.read_checkpoint(&id).await? {
            Some(stored) => Ok(Some(CheckpointFile::from_stored(stored)?)),
            None => Ok(None),
        }
    }

    /// Read and parse the checkpoint of one phase.
    pub async fn read_checkpoint<C: Checkpoint>(&self, phase: SyncPhase) -> Result<Option<C>> {
        match self.read_checkpoint_file::<C>(phase).await? {
            Some(file) => Ok(Some(file.parse()?)),
            None => Ok(None),
        }
    }

    /// Read the newest checkpoint across all phases.
    ///
    /// This is a **LOADING** operation used when a job restarts: whichever
    /// phase committed last holds the state to resume from.
    pub async fn read_latest_checkpoint<C: Checkpoint>(&self) -> Result<Option<(SyncPhase, C)>> {
        let mut latest: Option<CheckpointFile> = None;
        for phase in SyncPhase::ALL {
            if let Some(file) = self.read_checkpoint_file::<C>(phase).await? {
                let newer = latest
                    .as_ref()
                    .map(|current| file.created_at() >= current.created_at())
                    .unwrap_or(true);
                if newer {
                    latest = Some(file);
                }
            }
        }

        match latest {
            Some(file) => Ok(Some((*file.phase(), file.parse()?))),
            None => Ok(None),
        }
    }
}

/// Store that discards every checkpoint.
///
/// Used when the downstream consumer of the event stream is the only place
/// state is persisted.
pub struct NullStore;

#[async_trait]
impl CheckpointStore for NullStore {
    async fn store_checkpoint(&self, _id: &CheckpointID, _checkpoint_data: String) -> Result<()> {
        Ok(())
    }

    async fn read_checkpoint(&self, _id: &CheckpointID) -> Result<Option<StoredCheckpoint>> {
        Ok(None)
    }
}
