//! Checkpoint management for journal-sync
//!
//! Provides storage-agnostic checkpoint file handling with support for
//! source-specific checkpoint types.
//!
//! # Architecture
//!
//! This crate provides a generic checkpoint system that:
//! - Defines the `Checkpoint` trait for source-specific checkpoint types
//! - Provides `CheckpointFile` wrapper for storage-agnostic serialization
//! - Manages checkpoint saving/loading for one job via `SyncManager`
//! - Supports multiple storage backends via `CheckpointStore` trait
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - Stores one JSON file per job and phase
//! - `NullStore` - Discards checkpoints (the downstream consumer persists them)

mod file;
mod filesystem;
mod manager;
mod phase;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export file types
pub use file::CheckpointFile;

// Re-export manager types
pub use manager::{NullStore, SyncManager};

// Re-export phase types
pub use phase::SyncPhase;

// Re-export store trait and types
pub use store::{CheckpointID, CheckpointStore, StoredCheckpoint};

// Re-export storage implementations
pub use filesystem::FilesystemStore;

/// Trait that source-specific checkpoints must implement.
///
/// This trait defines the interface for checkpoint types, enabling
/// storage-agnostic checkpoint file handling while preserving
/// source-specific data structures.
///
/// # Example
///
/// ```rust
/// use checkpoint::Checkpoint;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct MySourceCheckpoint {
///     pub position: u64,
/// }
///
/// impl Checkpoint for MySourceCheckpoint {
///     const SOURCE_TYPE: &'static str = "mysource";
///
///     fn to_cli_string(&self) -> String {
///         self.position.to_string()
///     }
///
///     fn from_cli_string(s: &str) -> anyhow::Result<Self> {
///         Ok(Self { position: s.parse()? })
///     }
/// }
/// ```
pub trait Checkpoint: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone {
    /// Source type identifier (e.g., "as400-journal").
    ///
    /// This constant is used to:
    /// - Identify the checkpoint type in serialized files
    /// - Validate checkpoint type when loading from storage
    const SOURCE_TYPE: &'static str;

    /// Convert to CLI-friendly string format.
    ///
    /// The returned string should be parseable by `from_cli_string()`.
    fn to_cli_string(&self) -> String;

    /// Parse from CLI string format.
    ///
    /// Should parse the format produced by `to_cli_string()`.
    fn from_cli_string(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;
}
