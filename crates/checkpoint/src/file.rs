//! Checkpoint file wrapper for storage-agnostic serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Checkpoint, StoredCheckpoint, SyncPhase};

/// Storage-agnostic checkpoint file wrapper.
///
/// This struct wraps source-specific checkpoints with metadata
/// for storage and retrieval. The format is designed to be:
/// - Self-describing (includes `source_type` field)
/// - Extensible (uses JSON Value for checkpoint data)
///
/// # File Format
///
/// ```json
/// {
///     "source_type": "as400-journal",
///     "checkpoint": {
///         "lastJournalEntryIdMap": { "JRNLIB_QSQJRN": 1042 },
///         "jobVersion": 3,
///         "shapeVersion": 1
///     },
///     "phase": "PollCycle",
///     "created_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Source type identifier
    pub source_type: String,
    /// Serialized checkpoint data as JSON Value
    pub checkpoint: serde_json::Value,
    /// Sync phase when this checkpoint was created
    pub phase: SyncPhase,
    /// Timestamp when this checkpoint file was created
    pub created_at: DateTime<Utc>,
}

impl CheckpointFile {
    /// Build a checkpoint file from what a `CheckpointStore` returned.
    pub fn from_stored(stored: StoredCheckpoint) -> anyhow::Result<Self> {
        Ok(Self {
            phase: SyncPhase::parse(&stored.phase)?,
            checkpoint: serde_json::from_str(&stored.checkpoint_data)?,
            source_type: stored.source_type,
            created_at: stored.created_at,
        })
    }

    /// Parse checkpoint into source-specific type.
    ///
    /// Validates that the stored `source_type` matches the expected type `C`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The `source_type` doesn't match `C::SOURCE_TYPE`
    /// - The checkpoint data can't be deserialized into type `C`
    pub fn parse<C: Checkpoint>(&self) -> anyhow::Result<C> {
        if self.source_type != C::SOURCE_TYPE {
            anyhow::bail!(
                "Checkpoint type mismatch: expected '{}', found '{}'",
                C::SOURCE_TYPE,
                self.source_type
            );
        }
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }

    /// Get the source type of this checkpoint file.
    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// Get the phase when this checkpoint was created.
    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    /// Get the timestamp when this checkpoint file was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
