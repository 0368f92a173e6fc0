//! Local snapshot store
//!
//! Journal delete entries carry no column values. To report a delete with
//! meaningful data, the key columns of every row are remembered here when the
//! row is upserted, keyed by `{tableKey}_{rowIdentity}`.
//!
//! The store is a redb file owned by one job:
//! `{root}/realtime/{job_id}/RealTimeReadRecords.redb`.

use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::StoreError;

/// Key columns captured for one row.
pub type KeyColumns = Map<String, Value>;

/// Snapshot records (key: record id, value: JSON-encoded key columns)
const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("realtime_records");

/// File name of the store inside the job directory.
pub const STORE_FILE_NAME: &str = "RealTimeReadRecords.redb";

fn db_err<E: Into<redb::Error>>(e: E) -> StoreError {
    StoreError::Database(e.into())
}

/// Durable map from record id to the key columns last seen for that row.
pub struct LocalSnapshotStore {
    db: Database,
    path: PathBuf,
}

impl LocalSnapshotStore {
    /// Path of the store of a job below `root`.
    pub fn job_path(root: impl AsRef<Path>, job_id: &str) -> PathBuf {
        root.as_ref()
            .join("realtime")
            .join(job_id)
            .join(STORE_FILE_NAME)
    }

    /// Open (or create) the store of a job below `root`.
    pub fn open(root: impl AsRef<Path>, job_id: &str) -> Result<Self, StoreError> {
        Self::open_path(Self::job_path(root, job_id))
    }

    /// Open (or create) a store at an explicit file path.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path).map_err(db_err)?;

        // Create the table if it doesn't exist
        let write_txn = db.begin_write().map_err(db_err)?;
        {
            write_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        info!("Opened local snapshot store at {}", path.display());
        Ok(Self { db, path })
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the key columns of a record.
    pub fn upsert(&self, id: &str, key_columns: &KeyColumns) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(key_columns)?;

        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = write_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
            table.insert(id, bytes.as_slice()).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        debug!("Upserted snapshot record {id}");
        Ok(())
    }

    /// Insert or replace many records in one write transaction.
    pub fn upsert_many<'a, I>(&self, records: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a KeyColumns)>,
    {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let mut written = 0;
        {
            let mut table = write_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
            for (id, key_columns) in records {
                let bytes = serde_json::to_vec(key_columns)?;
                table.insert(id, bytes.as_slice()).map_err(db_err)?;
                written += 1;
            }
        }
        write_txn.commit().map_err(db_err)?;

        debug!("Upserted {written} snapshot records");
        Ok(written)
    }

    /// Key columns of a record, if the record is known.
    pub fn get(&self, id: &str) -> Result<Option<KeyColumns>, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
        let key_columns = match table.get(id).map_err(db_err)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(key_columns)
    }

    /// Remove a record. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let existed = {
            let mut table = write_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
            let removed = table.remove(id).map_err(db_err)?;
            removed.is_some()
        };
        write_txn.commit().map_err(db_err)?;

        debug!("Deleted snapshot record {id}");
        Ok(existed)
    }

    /// Remove every record.
    pub fn clear(&self) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        write_txn.delete_table(RECORDS_TABLE).map_err(db_err)?;
        {
            write_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        info!("Cleared local snapshot store at {}", self.path.display());
        Ok(())
    }

    /// Number of records.
    pub fn len(&self) -> Result<u64, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
        let len = table.len().map_err(db_err)?;
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// All record ids, in key order.
    pub fn ids(&self) -> Result<Vec<String>, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS_TABLE).map_err(db_err)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (key, _) = entry.map_err(db_err)?;
            ids.push(key.value().to_string());
        }
        Ok(ids)
    }
}
