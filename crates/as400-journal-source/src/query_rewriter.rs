//! Load and row-lookup query derivation
//!
//! The base query of a shape is rewritten twice without parsing SQL:
//!
//! - the load query selects every row of the base query plus one row
//!   identity column per monitored table;
//! - the row-lookup query restricts the base query to a single row identity.
//!
//! Keywords are matched case-insensitively as whole words. A keyword inside a
//! string literal, a quoted identifier or a comment is still treated as a
//! keyword, and the first `FROM` of every `UNION` branch is assumed to
//! separate the projection from the source.

use crate::error::{Result, SyncError};
use crate::settings::JournalInfo;

/// Row identity function of DB2 for i.
pub const DEFAULT_ROW_IDENTITY_FN: &str = "RRN";

/// Rewrites a shape's base query for the real-time read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRewriter {
    identity_fn: String,
}

impl Default for QueryRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_IDENTITY_FN)
    }
}

impl QueryRewriter {
    /// Create a rewriter using the given row identity function.
    pub fn new(identity_fn: impl Into<String>) -> Self {
        Self {
            identity_fn: identity_fn.into(),
        }
    }

    /// Name of the row identity function.
    pub fn identity_fn(&self) -> &str {
        &self.identity_fn
    }

    /// Row identity expression for a table alias, e.g. `RRN(X)`.
    pub fn identity_expr(&self, table_alias: &str) -> String {
        format!("{}({})", self.identity_fn, table_alias)
    }

    /// Check that a base query can be rewritten.
    pub fn validate(&self, base_query: &str) -> Result<()> {
        if self.identity_fn.trim().is_empty() {
            return Err(SyncError::configuration(
                "row identity function name must not be empty",
            ));
        }
        if base_query.trim().is_empty() {
            return Err(SyncError::configuration("base query must not be empty"));
        }
        for (index, branch) in split_keyword(base_query, "UNION").into_iter().enumerate() {
            if find_keyword(branch, "FROM").is_none() {
                return Err(missing_from(index, branch));
            }
        }
        Ok(())
    }

    /// Build the full-load query.
    ///
    /// Every `UNION` branch gets `, FN(tableAlias) AS tableKey` appended to its
    /// projection for each monitored table, followed by `\nFROM` and the rest
    /// of the branch.
    pub fn build_load_query(&self, base_query: &str, tables: &[JournalInfo]) -> Result<String> {
        let identities: String = tables
            .iter()
            .map(|table| {
                format!(
                    ", {} AS {}",
                    self.identity_expr(&table.table_alias()),
                    table.table_key()
                )
            })
            .collect();

        let mut branches = Vec::new();
        for (index, branch) in split_keyword(base_query, "UNION").into_iter().enumerate() {
            let branch = branch.trim();
            let from = find_keyword(branch, "FROM").ok_or_else(|| missing_from(index, branch))?;
            let select = branch[..from].trim_end();
            let rest = branch[from + "FROM".len()..].trim_start();
            branches.push(format!("{select}{identities}\nFROM {rest}"));
        }

        Ok(branches.join(" UNION "))
    }

    /// Build the query that re-reads a single row by its identity.
    ///
    /// Appends `AND FN(alias) = identity` when the base query already has a
    /// `WHERE` clause and `WHERE FN(alias) = identity` otherwise.
    pub fn build_row_lookup_query(
        &self,
        base_query: &str,
        table_alias: &str,
        row_identity: &str,
    ) -> Result<String> {
        let base = base_query.trim_end();
        if find_keyword(base, "FROM").is_none() {
            return Err(missing_from(0, base));
        }
        let conjunction = if has_where_clause(base) { "AND" } else { "WHERE" };
        Ok(format!(
            "{base} {conjunction} {} = {row_identity}",
            self.identity_expr(table_alias)
        ))
    }
}

fn missing_from(branch: usize, text: &str) -> SyncError {
    SyncError::configuration(format!(
        "no FROM keyword in branch {branch} of base query: {text}"
    ))
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#' | '@')
}

/// Byte offsets of whole-word, case-insensitive occurrences of `keyword`.
fn keyword_positions(text: &str, keyword: &str) -> Vec<usize> {
    // ASCII case folding keeps byte offsets intact
    let haystack = text.to_ascii_uppercase();
    let needle = keyword.to_ascii_uppercase();

    let mut positions = Vec::new();
    let mut start = 0;
    while let Some(found) = haystack[start..].find(&needle) {
        let at = start + found;
        let end = at + needle.len();
        let bounded_before = text[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !is_identifier_char(c));
        let bounded_after = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_identifier_char(c));
        if bounded_before && bounded_after {
            positions.push(at);
        }
        start = end;
    }
    positions
}

fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    keyword_positions(text, keyword).into_iter().next()
}

/// Split `text` around every whole-word occurrence of `keyword`.
fn split_keyword<'a>(text: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for at in keyword_positions(text, keyword) {
        parts.push(&text[last..at]);
        last = at + keyword.len();
    }
    parts.push(&text[last..]);
    parts
}

/// Whether the query has a whitespace-bounded `WHERE` that is not a quoted
/// or bracketed identifier.
fn has_where_clause(query: &str) -> bool {
    keyword_positions(query, "WHERE").into_iter().any(|at| {
        let before = query[..at].chars().next_back();
        let after = query[at + "WHERE".len()..].chars().next();
        let quoted = matches!(before, Some('"' | '[')) || matches!(after, Some('"' | ']'));
        before.map_or(false, char::is_whitespace) && !quoted
    })
}
