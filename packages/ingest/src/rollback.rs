//! Rollback manager: removes everything a year left behind when it did not
//! commit.
//!
//! Never fails. Whatever could not be cleaned is recorded in the returned
//! [`RollbackReport`] and surfaced as a [`RollbackWarning`] in the log.

use std::fmt;
use std::path::{Path, PathBuf};

use duckdb::Connection;
use retro_archive_database::{paths, rollback};
use retro_archive_ingest_models::{RollbackReport, TableCleanupOutcome, Year};

use crate::acquire::{RawFileKind, list_raw_files};
use crate::config::IngestConfig;

/// Summary of a rollback that did not fully clean up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackWarning {
    /// The partition.
    pub year: Option<Year>,
    /// Tables skipped for lack of a partition key.
    pub skipped: Vec<String>,
    /// Tables whose delete failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Other errors.
    pub errors: Vec<String>,
}

impl RollbackWarning {
    /// Builds a warning from `report`, or `None` if it is clean.
    #[must_use]
    pub fn from_report(report: &RollbackReport) -> Option<Self> {
        if report.is_clean() {
            return None;
        }

        Some(Self {
            year: report.year,
            skipped: report.skipped().map(|t| t.qualified_name()).collect(),
            failed: report
                .failures()
                .filter_map(|t| match &t.outcome {
                    TableCleanupOutcome::Failed { reason } => {
                        Some((t.qualified_name(), reason.clone()))
                    }
                    _ => None,
                })
                .collect(),
            errors: report.errors.clone(),
        })
    }
}

impl fmt::Display for RollbackWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "rollback of {year} incomplete")?,
            None => write!(f, "rollback incomplete")?,
        }
        if !self.skipped.is_empty() {
            write!(f, "; no partition key: {}", self.skipped.join(", "))?;
        }
        for (table, reason) in &self.failed {
            write!(f, "; {table} failed: {reason}")?;
        }
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

/// Removes a year's rows, raw files, and parser output.
#[derive(Debug, Clone)]
pub struct RollbackManager {
    source_dir: PathBuf,
    output_root: PathBuf,
}

impl RollbackManager {
    /// Creates a manager over the given directories.
    #[must_use]
    pub const fn new(source_dir: PathBuf, output_root: PathBuf) -> Self {
        Self {
            source_dir,
            output_root,
        }
    }

    /// Creates a manager from the run configuration.
    #[must_use]
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.source_dir.clone(), config.output_root.clone())
    }

    /// Rolls `year` back in the store and on disk.
    ///
    /// Event and roster files are both removed: they belong to a year that
    /// is not in the store and will be downloaded again on retry.
    #[must_use]
    pub fn rollback(&self, conn: &Connection, year: Year) -> RollbackReport {
        log::info!("{year}: rolling back");

        let mut report = rollback::delete_partition(conn, year);

        for kind in [RawFileKind::Event, RawFileKind::Roster] {
            match list_raw_files(&self.source_dir, year, kind) {
                Ok(files) => {
                    for file in files {
                        remove_path(&file, &mut report);
                    }
                }
                Err(e) => report
                    .errors
                    .push(format!("list {}: {e}", self.source_dir.display())),
            }
        }

        let output_dir = paths::parser_output_dir(&self.output_root, year);
        if output_dir.exists() {
            remove_path(&output_dir, &mut report);
        }

        match RollbackWarning::from_report(&report) {
            Some(warning) => log::warn!("{warning}"),
            None => log::info!(
                "{year}: rolled back cleanly ({} rows, {} paths)",
                report.rows_deleted(),
                report.removed_paths.len()
            ),
        }

        report
    }

    /// Removes the files a committed year no longer needs: its event files
    /// and its parser output. Roster files are kept. Failures are logged.
    pub fn cleanup_committed(&self, year: Year) {
        let mut report = RollbackReport::for_year(year);

        match list_raw_files(&self.source_dir, year, RawFileKind::Event) {
            Ok(files) => {
                for file in files {
                    remove_path(&file, &mut report);
                }
            }
            Err(e) => report.errors.push(e.to_string()),
        }

        let output_dir = paths::parser_output_dir(&self.output_root, year);
        if output_dir.exists() {
            remove_path(&output_dir, &mut report);
        }

        for error in &report.errors {
            log::warn!("{year}: post-commit cleanup: {error}");
        }
        log::debug!(
            "{year}: removed {} paths after commit",
            report.removed_paths.len()
        );
    }
}

fn remove_path(path: &Path, report: &mut RollbackReport) {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => report.removed_paths.push(path.display().to_string()),
        Err(e) => report
            .errors
            .push(format!("remove {}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use retro_archive_database::queries::count_events_for_year;
    use retro_archive_database::store::{open_in_memory, setup_schema};
    use retro_archive_ingest_models::TableCleanup;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        source: PathBuf,
        output_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("retrosheet");
        let output_root = dir.path().join("parser_output");
        std::fs::create_dir_all(&source).unwrap();
        for name in ["1987BOS.EVA", "BOS1987.ROS", "1986BOS.EVA", "BOS1986.ROS"] {
            std::fs::write(source.join(name), "").unwrap();
        }
        let out = paths::parser_output_dir(&output_root, Year::new(1987));
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("events.csv"), "game_id\n").unwrap();
        Fixture {
            _dir: dir,
            source,
            output_root,
        }
    }

    #[test]
    fn removes_rows_raw_files_and_output() {
        let fx = fixture();
        let conn = open_in_memory().unwrap();
        setup_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO event.events (game_id) VALUES ('BOS198704060'), ('BOS198604060')",
        )
        .unwrap();

        let manager = RollbackManager::new(fx.source.clone(), fx.output_root.clone());
        let report = manager.rollback(&conn, Year::new(1987));

        assert!(report.is_clean());
        assert_eq!(report.rows_deleted(), 1);
        assert_eq!(report.removed_paths.len(), 3);
        assert!(!fx.source.join("1987BOS.EVA").exists());
        assert!(!fx.source.join("BOS1987.ROS").exists());
        assert!(fx.source.join("1986BOS.EVA").exists());
        assert!(!paths::parser_output_dir(&fx.output_root, Year::new(1987)).exists());
        assert_eq!(count_events_for_year(&conn, Year::new(1986)).unwrap(), 1);
    }

    #[test]
    fn committed_cleanup_keeps_rosters() {
        let fx = fixture();
        let manager = RollbackManager::new(fx.source.clone(), fx.output_root.clone());
        manager.cleanup_committed(Year::new(1987));

        assert!(!fx.source.join("1987BOS.EVA").exists());
        assert!(fx.source.join("BOS1987.ROS").exists());
        assert!(!paths::parser_output_dir(&fx.output_root, Year::new(1987)).exists());
    }

    #[test]
    fn rollback_without_store_reports_instead_of_failing() {
        let fx = fixture();
        let conn = open_in_memory().unwrap();
        conn.execute_batch("CREATE SCHEMA event; CREATE TABLE event.notes (note VARCHAR);")
            .unwrap();

        let manager = RollbackManager::new(fx.source, fx.output_root);
        let report = manager.rollback(&conn, Year::new(1987));

        let warning = RollbackWarning::from_report(&report).unwrap();
        assert_eq!(warning.skipped, vec!["event.notes".to_string()]);
        assert!(warning.to_string().contains("no partition key: event.notes"));
    }

    #[test]
    fn clean_report_has_no_warning() {
        let mut report = RollbackReport::for_year(Year::new(1987));
        report.tables.push(TableCleanup {
            schema: "event".to_string(),
            table: "events".to_string(),
            outcome: TableCleanupOutcome::Deleted { rows: 0 },
        });
        assert_eq!(RollbackWarning::from_report(&report), None);
    }
}
