//! Typed outcome of removing one partition from the store.
//!
//! Every table visited by the rollback gets exactly one
//! [`TableCleanupOutcome`], so callers can tell a table that had nothing to
//! delete apart from one that could not be cleaned at all.

use serde::{Deserialize, Serialize};

use crate::Year;

/// Result of cleaning a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableCleanupOutcome {
    /// Rows tagged with the partition were deleted (possibly zero).
    Deleted {
        /// Number of rows removed.
        rows: u64,
    },
    /// The table exposes no derivable partition key, so nothing was tried.
    SkippedNoPartitionKey,
    /// The delete was attempted and failed.
    Failed {
        /// Error text from the store.
        reason: String,
    },
}

/// Cleanup result for one qualified table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCleanup {
    /// Schema name (e.g. `event`).
    pub schema: String,
    /// Table name (e.g. `events`).
    pub table: String,
    /// What happened.
    pub outcome: TableCleanupOutcome,
}

impl TableCleanup {
    /// `schema.table`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Everything the rollback of one partition did, or failed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// The partition, when the report belongs to one.
    pub year: Option<Year>,
    /// Per-table outcomes in the order they were visited.
    pub tables: Vec<TableCleanup>,
    /// Files and directories removed from disk.
    pub removed_paths: Vec<String>,
    /// Errors that were not attributable to a single table (connection,
    /// table listing, file removal).
    pub errors: Vec<String>,
}

impl RollbackReport {
    /// An empty report for `year`.
    #[must_use]
    pub fn for_year(year: Year) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    /// Total rows removed across all tables.
    #[must_use]
    pub fn rows_deleted(&self) -> u64 {
        self.tables
            .iter()
            .map(|t| match t.outcome {
                TableCleanupOutcome::Deleted { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    /// Tables that were skipped for lack of a partition key.
    pub fn skipped(&self) -> impl Iterator<Item = &TableCleanup> {
        self.tables
            .iter()
            .filter(|t| t.outcome == TableCleanupOutcome::SkippedNoPartitionKey)
    }

    /// Tables whose cleanup failed.
    pub fn failures(&self) -> impl Iterator<Item = &TableCleanup> {
        self.tables
            .iter()
            .filter(|t| matches!(t.outcome, TableCleanupOutcome::Failed { .. }))
    }

    /// `true` when no table failed, no table was skipped, and no stray
    /// error was recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.failures().next().is_none() && self.skipped().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleanup(table: &str, outcome: TableCleanupOutcome) -> TableCleanup {
        TableCleanup {
            schema: "event".to_string(),
            table: table.to_string(),
            outcome,
        }
    }

    #[test]
    fn clean_report_sums_deleted_rows() {
        let mut report = RollbackReport::for_year(Year::new(1987));
        report
            .tables
            .push(cleanup("events", TableCleanupOutcome::Deleted { rows: 40 }));
        report
            .tables
            .push(cleanup("event_flags", TableCleanupOutcome::Deleted { rows: 2 }));

        assert!(report.is_clean());
        assert_eq!(report.rows_deleted(), 42);
    }

    #[test]
    fn skipped_table_makes_report_unclean() {
        let mut report = RollbackReport::for_year(Year::new(1987));
        report
            .tables
            .push(cleanup("orphans", TableCleanupOutcome::SkippedNoPartitionKey));

        assert!(!report.is_clean());
        assert_eq!(report.skipped().count(), 1);
        assert_eq!(report.skipped().next().unwrap().qualified_name(), "event.orphans");
    }

    #[test]
    fn failed_table_and_stray_errors_are_reported() {
        let mut report = RollbackReport::for_year(Year::new(1987));
        report.tables.push(cleanup(
            "events",
            TableCleanupOutcome::Failed {
                reason: "lock".to_string(),
            },
        ));
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_clean());

        let mut report = RollbackReport::for_year(Year::new(1987));
        report.errors.push("connection reset".to_string());
        assert!(!report.is_clean());
    }
}
