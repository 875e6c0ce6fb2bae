//! Load stage: insert every output file of a year in one transaction.

use std::path::Path;

use duckdb::Connection;
use retro_archive_database::DbError;
use retro_archive_database::load::{FileLoad, PartitionLoad};
use retro_archive_database::registry::OUTPUT_FILES;
use retro_archive_ingest_models::progress::ProgressCallback;
use retro_archive_ingest_models::{PartitionState, Year};
use tokio_util::sync::CancellationToken;

use crate::PartitionError;

/// Errors from the load stage. The transaction has been rolled back by the
/// time one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The transaction could not be opened.
    #[error("could not start load transaction: {0}")]
    Begin(DbError),

    /// One output file failed to load.
    #[error("{file}: {source}")]
    File {
        /// Output file name.
        file: String,
        /// Store error.
        source: DbError,
    },

    /// The commit itself failed.
    #[error("commit failed: {0}")]
    Commit(DbError),
}

/// What a committed load wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedPartition {
    /// Files that were present and loaded, in load order.
    pub files: Vec<FileLoad>,
    /// Rows inserted across all tables.
    pub rows_loaded: u64,
}

/// Loads `year`'s output files from `output_dir` and commits them.
///
/// `token` is checked once more after the last file and before `COMMIT`; if
/// it has been cancelled the transaction is rolled back and
/// [`PartitionError::Cancelled`] is returned.
///
/// # Errors
///
/// Returns [`PartitionError::Load`] if any file fails to load or the commit
/// fails, or [`PartitionError::Cancelled`] at the commit point.
pub fn load_partition(
    conn: &Connection,
    year: Year,
    output_dir: &Path,
    token: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> Result<LoadedPartition, PartitionError> {
    let mut load = PartitionLoad::begin(conn, year).map_err(LoadError::Begin)?;

    progress.set_total(OUTPUT_FILES.len() as u64);
    progress.set_message(format!("{year} files"));

    let mut loaded = LoadedPartition::default();

    for file in OUTPUT_FILES {
        match load.load_file(file, output_dir) {
            Ok(Some(result)) => {
                loaded.rows_loaded += result.rows;
                loaded.files.push(result);
            }
            Ok(None) => {}
            Err(source) => {
                abort(load, year);
                return Err(LoadError::File {
                    file: file.file_name(),
                    source,
                }
                .into());
            }
        }
        progress.inc(1);
    }

    if token.is_cancelled() {
        log::warn!("{year}: cancelled at commit point, discarding load");
        abort(load, year);
        return Err(PartitionError::Cancelled {
            state: PartitionState::Committed,
        });
    }

    load.commit().map_err(LoadError::Commit)?;
    progress.finish_and_clear();

    log::info!(
        "{year}: committed {} rows from {} files",
        loaded.rows_loaded,
        loaded.files.len()
    );

    Ok(loaded)
}

fn abort(load: PartitionLoad<'_>, year: Year) {
    if let Err(e) = load.abort() {
        log::warn!("{year}: rollback of load transaction failed: {e}");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use retro_archive_database::queries::count_events_for_year;
    use retro_archive_database::store::{open_in_memory, setup_schema};
    use retro_archive_ingest_models::progress::NullProgress;

    use super::*;

    /// Cancels a token when the `n`th file has been loaded.
    pub(crate) struct CancelAfterFiles {
        pub(crate) token: CancellationToken,
        pub(crate) after: u64,
        pub(crate) seen: Mutex<u64>,
    }

    impl ProgressCallback for CancelAfterFiles {
        fn set_total(&self, _total: u64) {}
        fn inc(&self, delta: u64) {
            let mut seen = self.seen.lock().unwrap();
            *seen += delta;
            if *seen >= self.after {
                self.token.cancel();
            }
        }
        fn set_message(&self, _msg: String) {}
        fn finish_and_clear(&self) {}
    }

    fn write_output(dir: &Path) {
        std::fs::write(
            dir.join("events.csv"),
            "game_id,event_id,event_key,batting_side\n\
             BOS198704060,1,1,top\n\
             BOS198704060,2,2,bottom\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("event_flags.csv"),
            "event_key,flag\n1,walk_off\n2,pinch_hit\n",
        )
        .unwrap();
    }

    #[test]
    fn commits_all_files() {
        let conn = open_in_memory().unwrap();
        setup_schema(&conn).unwrap();
        let out = tempfile::tempdir().unwrap();
        write_output(out.path());

        let loaded = load_partition(
            &conn,
            Year::new(1987),
            out.path(),
            &CancellationToken::new(),
            &NullProgress,
        )
        .unwrap();

        assert_eq!(loaded.files.len(), 2);
        assert_eq!(loaded.rows_loaded, 4);
        assert_eq!(count_events_for_year(&conn, Year::new(1987)).unwrap(), 2);
    }

    #[test]
    fn failed_file_leaves_no_rows() {
        let conn = open_in_memory().unwrap();
        setup_schema(&conn).unwrap();
        let out = tempfile::tempdir().unwrap();
        write_output(out.path());
        std::fs::write(out.path().join("games.csv"), "venue\nFenway\n").unwrap();

        let err = load_partition(
            &conn,
            Year::new(1987),
            out.path(),
            &CancellationToken::new(),
            &NullProgress,
        )
        .unwrap_err();

        assert!(matches!(err, PartitionError::Load(LoadError::File { .. })));
        assert_eq!(count_events_for_year(&conn, Year::new(1987)).unwrap(), 0);
    }

    #[test]
    fn cancellation_during_load_discards_everything() {
        let conn = open_in_memory().unwrap();
        setup_schema(&conn).unwrap();
        let out = tempfile::tempdir().unwrap();
        write_output(out.path());

        let token = CancellationToken::new();
        let progress = CancelAfterFiles {
            token: token.clone(),
            after: 1,
            seen: Mutex::new(0),
        };

        let err = load_partition(&conn, Year::new(1987), out.path(), &token, &progress)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(count_events_for_year(&conn, Year::new(1987)).unwrap(), 0);
    }
}
