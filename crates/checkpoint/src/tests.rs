//! Unit tests for the checkpoint crate.

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{
    Checkpoint, CheckpointFile, CheckpointID, CheckpointStore, FilesystemStore, NullStore,
    StoredCheckpoint, SyncManager, SyncPhase,
};

/// Test checkpoint type for unit tests.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct TestCheckpoint {
    value: u64,
}

impl Checkpoint for TestCheckpoint {
    const SOURCE_TYPE: &'static str = "test";

    fn to_cli_string(&self) -> String {
        self.value.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        Ok(Self { value: s.parse()? })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct OtherCheckpoint {
    value: u64,
}

impl Checkpoint for OtherCheckpoint {
    const SOURCE_TYPE: &'static str = "other";

    fn to_cli_string(&self) -> String {
        self.value.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        Ok(Self { value: s.parse()? })
    }
}

// ============================================================================
// CheckpointFile Tests
// ============================================================================

fn stored(checkpoint: &TestCheckpoint, source_type: &str, phase: SyncPhase) -> StoredCheckpoint {
    StoredCheckpoint {
        checkpoint_data: serde_json::to_string(checkpoint).unwrap(),
        source_type: source_type.to_string(),
        job_id: "job-1".to_string(),
        phase: phase.as_str().to_string(),
        created_at: chrono::Utc::now(),
    }
}

#[test]
fn test_checkpoint_file_roundtrip() {
    let original = TestCheckpoint { value: 12345 };

    let file =
        CheckpointFile::from_stored(stored(&original, "test", SyncPhase::PollCycle)).unwrap();
    assert_eq!(file.source_type(), "test");
    assert_eq!(file.phase(), &SyncPhase::PollCycle);

    let json = serde_json::to_string_pretty(&file).unwrap();
    let loaded: CheckpointFile = serde_json::from_str(&json).unwrap();
    let parsed: TestCheckpoint = loaded.parse().unwrap();

    assert_eq!(original, parsed);
}

#[test]
fn test_checkpoint_file_rejects_unknown_phase() {
    let mut record = stored(&TestCheckpoint { value: 1 }, "test", SyncPhase::FullLoad);
    record.phase = "full_sync_start".to_string();
    assert!(CheckpointFile::from_stored(record).is_err());
}

#[test]
fn test_checkpoint_type_mismatch() {
    let file = CheckpointFile::from_stored(stored(
        &TestCheckpoint { value: 42 },
        "wrong",
        SyncPhase::FullLoad,
    ))
    .unwrap();

    let err = file.parse::<TestCheckpoint>().unwrap_err().to_string();
    assert!(err.contains("type mismatch"));
    assert!(err.contains("expected 'test'"));
    assert!(err.contains("found 'wrong'"));
}

// ============================================================================
// SyncPhase Tests
// ============================================================================

#[test]
fn test_sync_phase_as_str_and_parse() {
    for phase in SyncPhase::ALL {
        assert_eq!(SyncPhase::parse(phase.as_str()).unwrap(), phase);
    }
    assert_eq!(format!("{}", SyncPhase::FullLoad), "full_load");
    assert_eq!(format!("{}", SyncPhase::PollCycle), "poll_cycle");
    assert!(SyncPhase::parse("full_sync_start").is_err());
}

// ============================================================================
// FilesystemStore Tests
// ============================================================================

#[tokio::test]
async fn test_filesystem_store_overwrites_in_place() {
    let tmp = TempDir::new().unwrap();
    let store = FilesystemStore::new(tmp.path().join("nested"));
    let id = CheckpointID {
        source_type: "test".to_string(),
        job_id: "job/1".to_string(),
        phase: SyncPhase::PollCycle.as_str().to_string(),
    };

    assert!(store.read_checkpoint(&id).await.unwrap().is_none());

    store
        .store_checkpoint(&id, "{\"value\":1}".to_string())
        .await
        .unwrap();
    store
        .store_checkpoint(&id, "{\"value\":2}".to_string())
        .await
        .unwrap();

    let files: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
    assert_eq!(files.len(), 1, "one file per job and phase");
    assert!(store
        .checkpoint_path(&id)
        .ends_with("checkpoint_job_1_poll_cycle.json"));

    let stored = store.read_checkpoint(&id).await.unwrap().unwrap();
    assert_eq!(stored.checkpoint_data, "{\"value\":2}");
    assert_eq!(stored.job_id, "job/1");
}

// ============================================================================
// SyncManager Tests
// ============================================================================

#[tokio::test]
async fn test_sync_manager_emit_and_read() {
    let tmp = TempDir::new().unwrap();
    let manager = SyncManager::new(FilesystemStore::new(tmp.path()), "job-a");

    manager
        .emit_checkpoint(&TestCheckpoint { value: 123 }, SyncPhase::FullLoad)
        .await
        .unwrap();

    let read: Option<TestCheckpoint> = manager.read_checkpoint(SyncPhase::FullLoad).await.unwrap();
    assert_eq!(read, Some(TestCheckpoint { value: 123 }));

    let missing: Option<TestCheckpoint> =
        manager.read_checkpoint(SyncPhase::PollCycle).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_sync_manager_jobs_are_isolated() {
    let tmp = TempDir::new().unwrap();
    let a = SyncManager::new(FilesystemStore::new(tmp.path()), "job-a");
    let b = SyncManager::new(FilesystemStore::new(tmp.path()), "job-b");

    a.emit_checkpoint(&TestCheckpoint { value: 1 }, SyncPhase::PollCycle)
        .await
        .unwrap();

    let read: Option<TestCheckpoint> = b.read_checkpoint(SyncPhase::PollCycle).await.unwrap();
    assert!(read.is_none());
}

#[tokio::test]
async fn test_sync_manager_reads_latest_across_phases() {
    let tmp = TempDir::new().unwrap();
    let manager = SyncManager::new(FilesystemStore::new(tmp.path()), "job-a");

    manager
        .emit_checkpoint(&TestCheckpoint { value: 100 }, SyncPhase::PollCycle)
        .await
        .unwrap();

    // Ensure a distinct creation time
    tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;

    manager
        .emit_checkpoint(&TestCheckpoint { value: 200 }, SyncPhase::FullLoad)
        .await
        .unwrap();

    let (phase, latest): (SyncPhase, TestCheckpoint) =
        manager.read_latest_checkpoint().await.unwrap().unwrap();
    assert_eq!(phase, SyncPhase::FullLoad);
    assert_eq!(latest.value, 200);
}

#[tokio::test]
async fn test_sync_manager_source_types_are_isolated() {
    let tmp = TempDir::new().unwrap();
    let store = FilesystemStore::new(tmp.path());
    let manager = SyncManager::new(store, "job-a");

    manager
        .emit_checkpoint(&OtherCheckpoint { value: 5 }, SyncPhase::PollCycle)
        .await
        .unwrap();

    // Files are keyed by job and phase, the source type is validated on parse
    let result = manager.read_checkpoint::<TestCheckpoint>(SyncPhase::PollCycle).await;
    assert!(result.unwrap_err().to_string().contains("type mismatch"));
}

#[tokio::test]
async fn test_null_store_discards() {
    let manager = SyncManager::new(NullStore, "job-a");
    manager
        .emit_checkpoint(&TestCheckpoint { value: 9 }, SyncPhase::PollCycle)
        .await
        .unwrap();
    let latest: Option<(SyncPhase, TestCheckpoint)> =
        manager.read_latest_checkpoint().await.unwrap();
    assert!(latest.is_none());
}

#[test]
fn test_checkpoint_cli_string_roundtrip() {
    let cp = TestCheckpoint { value: 999 };
    let parsed = TestCheckpoint::from_cli_string(&cp.to_cli_string()).unwrap();
    assert_eq!(parsed, cp);
    assert!(TestCheckpoint::from_cli_string("abc").is_err());
}

#[tokio::test]
async fn test_boxed_store() {
    let tmp = TempDir::new().unwrap();
    let store: Box<dyn CheckpointStore> = Box::new(FilesystemStore::new(tmp.path()));
    let manager = SyncManager::new(store, "job-a");
    manager
        .emit_checkpoint(&TestCheckpoint { value: 3 }, SyncPhase::PollCycle)
        .await
        .unwrap();
    let read: Option<TestCheckpoint> = manager.read_checkpoint(SyncPhase::PollCycle).await.unwrap();
    assert_eq!(read, Some(TestCheckpoint { value: 3 }));
}
