//! Journal receiver queries and entries
//!
//! Journal entries are read straight from the journal file with the columns
//! `JOCTRR` (relative record number), `JOLIB`/`JOMBR` (library and member of
//! the changed table), `JOSEQN` (sequence number) and `JOENTT` (entry type).
//! Only record-level entries (`JOCODE = 'R'`) are selected.

use journal_sync_driver::{DriverError, RowCursor};

use crate::settings::JournalInfo;

/// Entry type of a deleted record.
pub const DELETE_ENTRY_TYPE: &str = "DL";

/// Column the max-sequence query returns.
pub const MAX_SEQUENCE_COLUMN: &str = "MAX_JOSEQN";

/// Query for the record-level entries of one table after a sequence number.
pub fn journal_query(table: &JournalInfo, after_sequence: u64) -> String {
    format!(
        "SELECT JOCTRR, JOLIB, JOMBR, JOSEQN, JOENTT FROM {}.{} \
         WHERE JOSEQN > {} AND JOLIB = '{}' AND JOMBR = '{}' AND JOCODE = 'R' \
         ORDER BY JOSEQN",
        table.target_journal_library,
        table.target_journal_name,
        after_sequence,
        table.target_table_library,
        table.target_table_name
    )
}

/// Query for the current highest sequence number of a journal.
pub fn max_sequence_query(journal_library: &str, journal_name: &str) -> String {
    format!("SELECT MAX(JOSEQN) AS {MAX_SEQUENCE_COLUMN} FROM {journal_library}.{journal_name}")
}

/// One record-level journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub sequence: u64,
    pub library: String,
    pub member: String,
    /// Relative record number of the changed row
    pub row_identity: String,
    pub entry_type: String,
}

impl JournalEntry {
    /// Read the entry the cursor is positioned on.
    pub fn from_cursor(cursor: &dyn RowCursor) -> Result<Self, DriverError> {
        let sequence_value = cursor.value("JOSEQN")?;
        let sequence = sequence_value.as_u64().ok_or_else(|| {
            DriverError::query(
                "JOSEQN",
                format!("journal sequence is not an unsigned integer: {sequence_value}"),
            )
        })?;

        let text = |column: &str| -> Result<String, DriverError> {
            Ok(cursor.value(column)?.as_trimmed_str().unwrap_or_default())
        };

        Ok(Self {
            sequence,
            library: text("JOLIB")?,
            member: text("JOMBR")?,
            row_identity: cursor.value("JOCTRR")?.to_identity_string(),
            entry_type: text("JOENTT")?,
        })
    }

    /// Whether the entry records a row deletion. Every other entry type is
    /// treated as an insert or update.
    pub fn is_delete(&self) -> bool {
        self.entry_type == DELETE_ENTRY_TYPE
    }

    /// Snapshot record id of the changed row, `{JOLIB}_{JOMBR}_{JOCTRR}`.
    pub fn record_id(&self) -> String {
        format!("{}_{}_{}", self.library, self.member, self.row_identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_sync_driver::testing::{row, MemoryDriver};
    use journal_sync_driver::Driver;
    use sync_core::SourceValue;

    #[test]
    fn test_journal_query() {
        let table = JournalInfo::new("JRNLIB", "QSQJRN", "APPLIB", "ORDERS");
        assert_eq!(
            journal_query(&table, 1042),
            "SELECT JOCTRR, JOLIB, JOMBR, JOSEQN, JOENTT FROM JRNLIB.QSQJRN \
             WHERE JOSEQN > 1042 AND JOLIB = 'APPLIB' AND JOMBR = 'ORDERS' AND JOCODE = 'R' \
             ORDER BY JOSEQN"
        );
    }

    #[test]
    fn test_max_sequence_query() {
        assert_eq!(
            max_sequence_query("JRNLIB", "QSQJRN"),
            "SELECT MAX(JOSEQN) AS MAX_JOSEQN FROM JRNLIB.QSQJRN"
        );
    }

    #[tokio::test]
    async fn test_entry_from_padded_row() {
        let driver = MemoryDriver::new();
        driver.respond(
            "Q",
            vec![row([
                ("JOCTRR", SourceValue::Int(5)),
                ("JOLIB", SourceValue::text("APPLIB    ")),
                ("JOMBR", SourceValue::text("ORDERS    ")),
                ("JOSEQN", SourceValue::text("00000000000000000011")),
                ("JOENTT", SourceValue::text("DL")),
            ])],
        );
        let conn = driver.open_connection().await.unwrap();
        let mut cursor = conn.prepare("Q").await.unwrap().execute_query().await.unwrap();
        assert!(cursor.next().await.unwrap());

        let entry = JournalEntry::from_cursor(cursor.as_ref()).unwrap();
        assert_eq!(entry.sequence, 11);
        assert!(entry.is_delete());
        assert_eq!(entry.record_id(), "APPLIB_ORDERS_5");
    }

    #[tokio::test]
    async fn test_entry_with_bad_sequence() {
        let driver = MemoryDriver::new();
        driver.respond(
            "Q",
            vec![row([
                ("JOCTRR", SourceValue::Int(5)),
                ("JOLIB", SourceValue::text("L")),
                ("JOMBR", SourceValue::text("T")),
                ("JOSEQN", SourceValue::text("abc")),
                ("JOENTT", SourceValue::text("UP")),
            ])],
        );
        let conn = driver.open_connection().await.unwrap();
        let mut cursor = conn.prepare("Q").await.unwrap().execute_query().await.unwrap();
        assert!(cursor.next().await.unwrap());
        assert!(JournalEntry::from_cursor(cursor.as_ref()).is_err());
    }
}
