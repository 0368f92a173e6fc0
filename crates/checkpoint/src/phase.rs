//! Sync phase enumeration for checkpoint tracking.

use serde::{Deserialize, Serialize};

/// Represents the phases of a real-time read after which state is committed.
///
/// Both phases carry the same kind of state; the phase only records which
/// step produced it, so that resumption can pick the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Checkpoint emitted once the initial full load has completed.
    FullLoad,

    /// Checkpoint emitted after every completed poll cycle.
    PollCycle,
}

impl SyncPhase {
    /// All phases.
    pub const ALL: [SyncPhase; 2] = [SyncPhase::FullLoad, SyncPhase::PollCycle];

    /// Get the string representation of this phase.
    ///
    /// Used for:
    /// - Checkpoint file naming (e.g., `checkpoint_job1_poll_cycle.json`)
    /// - Logging and debugging output
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::FullLoad => "full_load",
            SyncPhase::PollCycle => "poll_cycle",
        }
    }

    /// Parse a phase from its string representation.
    pub fn parse(phase: &str) -> anyhow::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == phase)
            .ok_or_else(|| anyhow::anyhow!("Unknown sync phase: {phase}"))
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
