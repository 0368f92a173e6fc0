//! Real-time read settings
//!
//! Settings arrive as JSON from the job configuration. Keys are camelCase;
//! the PascalCase spellings written by older configuration forms are
//! accepted as well.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Result, SyncError};

/// Default polling interval in seconds.
pub const DEFAULT_POLLING_INTERVAL_SECONDS: u64 = 5;

fn default_polling_interval() -> u64 {
    DEFAULT_POLLING_INTERVAL_SECONDS
}

/// Settings of one real-time read job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeSettings {
    /// Seconds to wait between poll cycles.
    #[serde(
        default = "default_polling_interval",
        alias = "PollingIntervalSeconds",
        alias = "PollingInterval"
    )]
    pub polling_interval_seconds: u64,

    /// Monitored tables, in the order they are polled.
    #[serde(default, alias = "TableInformation")]
    pub table_information: Vec<JournalInfo>,
}

impl Default for RealTimeSettings {
    fn default() -> Self {
        Self {
            polling_interval_seconds: DEFAULT_POLLING_INTERVAL_SECONDS,
            table_information: Vec::new(),
        }
    }
}

/// A monitored table and the journal that records its changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalInfo {
    #[serde(alias = "TargetJournalLibrary")]
    pub target_journal_library: String,

    #[serde(alias = "TargetJournalName")]
    pub target_journal_name: String,

    #[serde(alias = "TargetTableLibrary")]
    pub target_table_library: String,

    #[serde(alias = "TargetTableName")]
    pub target_table_name: String,

    /// Alias of the table inside the base query.
    #[serde(
        default,
        alias = "TargetTableAlias",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_table_alias: Option<String>,
}

impl JournalInfo {
    pub fn new(
        journal_library: impl Into<String>,
        journal_name: impl Into<String>,
        table_library: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            target_journal_library: journal_library.into(),
            target_journal_name: journal_name.into(),
            target_table_library: table_library.into(),
            target_table_name: table_name.into(),
            target_table_alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.target_table_alias = Some(alias.into());
        self
    }

    /// Key under which the journal's sequence high-water mark is tracked,
    /// `{journalLibrary}_{journalName}`.
    pub fn journal_alias(&self) -> String {
        format!("{}_{}", self.target_journal_library, self.target_journal_name)
    }

    /// Output column name of the row identity, `{tableLibrary}_{tableName}`.
    pub fn table_key(&self) -> String {
        format!("{}_{}", self.target_table_library, self.target_table_name)
    }

    /// Qualifier used inside row identity expressions. Falls back to
    /// `{tableLibrary}.{tableName}` when no alias is configured.
    pub fn table_alias(&self) -> String {
        match self.target_table_alias.as_deref().map(str::trim) {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => format!("{}.{}", self.target_table_library, self.target_table_name),
        }
    }

    /// Snapshot record id of a row of this table.
    pub fn record_id(&self, row_identity: &str) -> String {
        format!("{}_{}", self.table_key(), row_identity)
    }

    fn validate(&self, index: usize) -> Result<()> {
        let required = [
            ("targetJournalLibrary", &self.target_journal_library),
            ("targetJournalName", &self.target_journal_name),
            ("targetTableLibrary", &self.target_table_library),
            ("targetTableName", &self.target_table_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::configuration(format!(
                    "tableInformation[{index}].{field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

impl RealTimeSettings {
    /// Parse settings from their JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::configuration(format!("invalid real-time settings: {e}")))
    }

    /// Load settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Interval between two poll cycles.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    /// Check that the settings describe at least one fully specified table.
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval_seconds == 0 {
            return Err(SyncError::configuration(
                "pollingIntervalSeconds must be at least 1",
            ));
        }
        if self.table_information.is_empty() {
            return Err(SyncError::configuration(
                "tableInformation must list at least one table",
            ));
        }
        for (index, table) in self.table_information.iter().enumerate() {
            table.validate(index)?;
        }
        Ok(())
    }

    /// Distinct journal aliases, in first-declared order.
    pub fn journal_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = Vec::new();
        for table in &self.table_information {
            let alias = table.journal_alias();
            if !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        aliases
    }

    /// Distinct journals as `(alias, library, name)`, in first-declared order.
    pub fn journals(&self) -> Vec<(String, &str, &str)> {
        let mut journals: Vec<(String, &str, &str)> = Vec::new();
        for table in &self.table_information {
            let alias = table.journal_alias();
            if !journals.iter().any(|(a, _, _)| *a == alias) {
                journals.push((
                    alias,
                    table.target_journal_library.as_str(),
                    table.target_journal_name.as_str(),
                ));
            }
        }
        journals
    }

    /// JSON Schema of the settings form, for configuration UIs.
    pub fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pollingIntervalSeconds": {
                    "type": "number",
                    "title": "Polling Interval",
                    "description": "How frequently to poll the journals for changes in seconds (default 5s).",
                    "default": DEFAULT_POLLING_INTERVAL_SECONDS,
                },
                "tableInformation": {
                    "type": "array",
                    "title": "Table Information",
                    "description": "Information about the tables to monitor for changes.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "targetJournalLibrary": {
                                "type": "string",
                                "title": "Target Journal Library",
                                "description": "The name of the library the target journal file is in.",
                            },
                            "targetJournalName": {
                                "type": "string",
                                "title": "Target Journal Name",
                                "description": "The name of the journal file to query for changes.",
                            },
                            "targetTableLibrary": {
                                "type": "string",
                                "title": "Target Table Library",
                                "description": "The name of the library the target table file is in.",
                            },
                            "targetTableName": {
                                "type": "string",
                                "title": "Target Table Name",
                                "description": "The name of the table file being monitored for changes.",
                            },
                            "targetTableAlias": {
                                "type": "string",
                                "title": "Target Table Alias",
                                "description": "The alias of the table file as defined in the query being monitored for changes.",
                            },
                        },
                        "required": [
                            "targetJournalLibrary",
                            "targetJournalName",
                            "targetTableLibrary",
                            "targetTableName",
                        ],
                    },
                },
            },
            "required": ["pollingIntervalSeconds", "tableInformation"],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_with_defaults() {
        let settings = RealTimeSettings::from_json(
            r#"{
                "tableInformation": [{
                    "targetJournalLibrary": "JRNLIB",
                    "targetJournalName": "QSQJRN",
                    "targetTableLibrary": "APPLIB",
                    "targetTableName": "ORDERS"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(settings.polling_interval_seconds, 5);
        assert_eq!(settings.polling_interval(), Duration::from_secs(5));
        let table = &settings.table_information[0];
        assert_eq!(table.journal_alias(), "JRNLIB_QSQJRN");
        assert_eq!(table.table_key(), "APPLIB_ORDERS");
        assert_eq!(table.table_alias(), "APPLIB.ORDERS");
        assert_eq!(table.record_id("17"), "APPLIB_ORDERS_17");
        settings.validate().unwrap();
    }

    #[test]
    fn test_parse_pascal_case() {
        let settings = RealTimeSettings::from_json(
            r#"{
                "PollingIntervalSeconds": 30,
                "TableInformation": [{
                    "TargetJournalLibrary": "J",
                    "TargetJournalName": "N",
                    "TargetTableLibrary": "L",
                    "TargetTableName": "T",
                    "TargetTableAlias": "X"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.polling_interval_seconds, 30);
        assert_eq!(settings.table_information[0].table_alias(), "X");
    }

    #[test]
    fn test_blank_alias_falls_back() {
        let table = JournalInfo::new("J", "N", "L", "T").with_alias("  ");
        assert_eq!(table.table_alias(), "L.T");
    }

    #[test]
    fn test_validate_rejects_incomplete_settings() {
        let empty = RealTimeSettings::default();
        assert!(matches!(
            empty.validate(),
            Err(SyncError::Configuration(_))
        ));

        let missing_name = RealTimeSettings {
            table_information: vec![JournalInfo::new("J", "", "L", "T")],
            ..Default::default()
        };
        let err = missing_name.validate().unwrap_err().to_string();
        assert!(err.contains("tableInformation[0].targetJournalName"));

        let zero_interval = RealTimeSettings {
            polling_interval_seconds: 0,
            table_information: vec![JournalInfo::new("J", "N", "L", "T")],
        };
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        assert!(matches!(
            RealTimeSettings::from_json("{not json"),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_journals_are_deduplicated() {
        let settings = RealTimeSettings {
            table_information: vec![
                JournalInfo::new("J", "N", "L", "A"),
                JournalInfo::new("J", "N", "L", "B"),
                JournalInfo::new("J", "M", "L", "C"),
            ],
            ..Default::default()
        };
        assert_eq!(settings.journal_aliases(), vec!["J_N", "J_M"]);
        let journals = settings.journals();
        assert_eq!(journals.len(), 2);
        assert_eq!(journals[1], ("J_M".to_string(), "J", "M"));
    }

    #[test]
    fn test_json_schema_lists_required_table_fields() {
        let schema = RealTimeSettings::json_schema();
        let required = &schema["properties"]["tableInformation"]["items"]["required"];
        assert_eq!(required.as_array().unwrap().len(), 4);
        assert_eq!(
            schema["properties"]["pollingIntervalSeconds"]["default"],
            json!(5)
        );
    }
}
