//! Per-year state machine and the run loop.
//!
//! ```text
//! Pending -> Acquiring -> Transforming -> Loading -> Committed
//!                \              \             \
//!                 +--------------+-------------+--> RolledBack
//! ```
//!
//! The cancellation token is checked on entry to `Acquiring`,
//! `Transforming`, and `Loading`, and once more at the commit point. A
//! failed year is rolled back and the run continues; a cancelled year is
//! rolled back and the run stops.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use duckdb::Connection;
use retro_archive_database::{paths, queries};
use retro_archive_ingest_models::progress::{ProgressCallback, null_progress};
use retro_archive_ingest_models::{
    CancelledPartition, CommittedPartition, FailedPartition, PartitionState, RunSummary, Stage,
    Year,
};
use tokio_util::sync::CancellationToken;

use crate::PartitionError;
use crate::acquire::{Acquirer, AcquisitionError};
use crate::config::IngestConfig;
use crate::load::{LoadError, load_partition};
use crate::rollback::RollbackManager;
use crate::transform::Transformer;

/// Drives pending years through the stages, one at a time.
pub struct Orchestrator<'a> {
    conn: &'a Connection,
    acquirer: &'a dyn Acquirer,
    transformer: &'a dyn Transformer,
    rollback: RollbackManager,
    output_root: PathBuf,
    token: CancellationToken,
    partitions: Arc<dyn ProgressCallback>,
    files: Arc<dyn ProgressCallback>,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator over one store connection.
    #[must_use]
    pub fn new(
        conn: &'a Connection,
        acquirer: &'a dyn Acquirer,
        transformer: &'a dyn Transformer,
        config: &IngestConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            conn,
            acquirer,
            transformer,
            rollback: RollbackManager::from_config(config),
            output_root: config.output_root.clone(),
            token,
            partitions: null_progress(),
            files: null_progress(),
        }
    }

    /// Reports progress over years to `partitions` and over the files of
    /// the year being loaded to `files`.
    #[must_use]
    pub fn with_progress(
        mut self,
        partitions: Arc<dyn ProgressCallback>,
        files: Arc<dyn ProgressCallback>,
    ) -> Self {
        self.partitions = partitions;
        self.files = files;
        self
    }

    /// Processes `pending` in order and summarizes the outcome.
    pub async fn run(&self, pending: Vec<Year>) -> RunSummary {
        let started_at = Utc::now();
        let mut committed = Vec::new();
        let mut failed = Vec::new();
        let mut cancelled = None;
        let mut interrupted = false;

        log::info!("Processing {} year(s)", pending.len());
        self.partitions.set_total(pending.len() as u64);

        for &year in &pending {
            if self.token.is_cancelled() {
                log::warn!("Cancelled, not starting {year}");
                interrupted = true;
                break;
            }

            match self.process(year).await {
                Ok(partition) => committed.push(partition),
                Err(PartitionError::Cancelled { state }) => {
                    log::warn!("{year}: cancelled before {state}, rolling back");
                    let rollback = self.rollback.rollback(self.conn, year);
                    cancelled = Some(CancelledPartition {
                        year,
                        state,
                        error: None,
                        rollback,
                    });
                    interrupted = true;
                    break;
                }
                // A stage killed by the same signal is a cancellation, not
                // a failure of this year.
                Err(e) if self.token.is_cancelled() => {
                    let state = e.stage().unwrap_or(Stage::Load).state();
                    log::warn!("{year}: cancelled during {state} ({e}), rolling back");
                    let rollback = self.rollback.rollback(self.conn, year);
                    cancelled = Some(CancelledPartition {
                        year,
                        state,
                        error: Some(e.to_string()),
                        rollback,
                    });
                    interrupted = true;
                    break;
                }
                Err(e) => {
                    let stage = e.stage().unwrap_or(Stage::Load);
                    log::error!("{year}: {stage} failed: {e}");
                    let rollback = self.rollback.rollback(self.conn, year);
                    failed.push(FailedPartition {
                        year,
                        stage,
                        message: e.to_string(),
                        rollback,
                    });
                }
            }
            self.partitions.inc(1);
        }

        self.partitions.finish_and_clear();

        let year_counts = queries::year_counts(self.conn).unwrap_or_else(|e| {
            log::warn!("Could not read final year counts: {e}");
            Vec::new()
        });

        RunSummary {
            started_at,
            finished_at: Utc::now(),
            pending,
            committed,
            failed,
            cancelled,
            interrupted,
            year_counts,
        }
    }

    /// Runs one year from `Pending` to `Committed`. The staging workspace
    /// lives exactly as long as this call.
    async fn process(&self, year: Year) -> Result<CommittedPartition, PartitionError> {
        self.enter(year, PartitionState::Acquiring)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("retro_archive_{year}_"))
            .tempdir()
            .map_err(|e| AcquisitionError::Io {
                path: std::env::temp_dir().display().to_string(),
                source: e,
            })?;
        let acquired = self.acquirer.acquire(year, staging.path()).await?;
        log::debug!(
            "{year}: acquired {} event files, {} roster files",
            acquired.event_files.len(),
            acquired.roster_files.len()
        );

        self.enter(year, PartitionState::Transforming)?;
        let output_dir = paths::parser_output_dir(&self.output_root, year);
        let transformed = self.transformer.transform(year, &output_dir).await?;

        self.enter(year, PartitionState::Loading)?;
        let rows_loaded = if transformed.fact_records == 0 {
            self.commit_empty(year)?;
            0
        } else {
            load_partition(
                self.conn,
                year,
                &transformed.output_dir,
                &self.token,
                self.files.as_ref(),
            )?
            .rows_loaded
        };

        self.rollback.cleanup_committed(year);
        log::info!("{year}: {}", PartitionState::Committed);

        Ok(CommittedPartition {
            year,
            fact_records: transformed.fact_records,
            rows_loaded,
        })
    }

    /// Commits a year with no records by writing it to the empty-year
    /// ledger, so later runs do not select it again.
    fn commit_empty(&self, year: Year) -> Result<(), PartitionError> {
        if self.token.is_cancelled() {
            return Err(PartitionError::Cancelled {
                state: PartitionState::Committed,
            });
        }
        log::warn!("{year}: no records, committing as empty");
        queries::record_empty_year(self.conn, year).map_err(LoadError::Commit)?;
        Ok(())
    }

    fn enter(&self, year: Year, state: PartitionState) -> Result<(), PartitionError> {
        if self.token.is_cancelled() {
            return Err(PartitionError::Cancelled { state });
        }
        log::info!("{year}: {state}");
        self.partitions.set_message(format!("{year} {state}"));
        Ok(())
    }
}

/// Renders a run summary for the terminal.
#[must_use]
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let years = |ys: &[Year]| {
        ys.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let elapsed = summary.finished_at - summary.started_at;
    let _ = writeln!(
        out,
        "Run finished in {}s: {} committed, {} failed, {} not attempted",
        elapsed.num_seconds(),
        summary.committed.len(),
        summary.failed.len(),
        summary.unattempted_years().len(),
    );

    if !summary.committed.is_empty() {
        let _ = writeln!(out, "Committed: {}", years(&summary.committed_years()));
    }

    for failure in &summary.failed {
        let _ = writeln!(
            out,
            "Failed: {} at {}: {}",
            failure.year, failure.stage, failure.message
        );
    }

    if let Some(cancelled) = &summary.cancelled {
        let residual = summary.count_for(cancelled.year);
        let when = cancelled.error.as_ref().map_or_else(
            || format!("before {}", cancelled.state),
            |error| format!("during {}: {error}", cancelled.state),
        );
        let _ = writeln!(
            out,
            "Interrupted after {} committed year(s); {} rolled back {when} ({residual} residual rows{})",
            summary.committed.len(),
            cancelled.year,
            if cancelled.rollback.is_clean() {
                ""
            } else {
                ", cleanup incomplete"
            },
        );
    } else if summary.interrupted {
        let _ = writeln!(
            out,
            "Interrupted after {} committed year(s); no year was in flight",
            summary.committed.len(),
        );
    }

    if !summary.year_counts.is_empty() {
        let _ = writeln!(out, "Events per year:");
        for count in &summary.year_counts {
            let _ = writeln!(out, "  {}: {}", count.year, count.events);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use retro_archive_database::queries::count_events_for_year;
    use retro_archive_database::store::{open_in_memory, setup_schema};
    use retro_archive_ingest_models::YearRange;

    use super::*;
    use crate::acquire::tests::write_zip;
    use crate::acquire::{
        AcquiredPartition, RawFileKind, check_archive_size, install_archive, list_raw_files,
    };
    use crate::selector::{YearSelection, pending_years};
    use crate::transform::{TransformationError, TransformedPartition, count_fact_records};

    const MIN_BYTES: u64 = 100;

    /// Serves archives from memory, running the real size check and
    /// extraction.
    struct FakeAcquirer {
        source_dir: PathBuf,
        corrupt: BTreeSet<Year>,
    }

    #[async_trait]
    impl Acquirer for FakeAcquirer {
        async fn acquire(
            &self,
            year: Year,
            staging: &Path,
        ) -> Result<AcquiredPartition, AcquisitionError> {
            let archive = staging.join(format!("{year}eve.zip"));
            if self.corrupt.contains(&year) {
                write_zip(&archive, &[]);
            } else {
                let event = format!("{year}BOS.EVA");
                let roster = format!("BOS{year}.ROS");
                let team = format!("TEAM{year}");
                let body = "x".repeat(200);
                write_zip(
                    &archive,
                    &[
                        (event.as_str(), body.as_str()),
                        (roster.as_str(), "clemr001"),
                        (team.as_str(), "BOS"),
                    ],
                );
            }
            let bytes = std::fs::metadata(&archive).unwrap().len();
            check_archive_size(&archive, bytes, MIN_BYTES)?;
            install_archive(&archive, year, staging, &self.source_dir)
        }
    }

    /// Emulates the parser: emits rows for every year with an event file in
    /// the source directory, with a column the store does not know and
    /// without most optional columns.
    #[derive(Default)]
    struct FakeTransformer {
        source_dir: PathBuf,
        fail: BTreeSet<Year>,
        empty: BTreeSet<Year>,
        bad_auxiliary: BTreeSet<Year>,
        /// Cancels the token and exits as if killed by the signal.
        interrupt: Option<(Year, CancellationToken)>,
        calls: Mutex<Vec<Year>>,
    }

    #[async_trait]
    impl Transformer for FakeTransformer {
        async fn transform(
            &self,
            year: Year,
            output_dir: &Path,
        ) -> Result<TransformedPartition, TransformationError> {
            self.calls.lock().unwrap().push(year);
            if let Some((at, token)) = &self.interrupt
                && *at == year
            {
                token.cancel();
                return Err(TransformationError::Failed {
                    status: "signal: 2 (SIGINT)".to_string(),
                    stderr: String::new(),
                });
            }
            if self.fail.contains(&year) {
                return Err(TransformationError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "bad event file".to_string(),
                });
            }

            std::fs::create_dir_all(output_dir).unwrap();
            let mut events =
                String::from("game_id,event_id,event_key,inning,batting_side,parser_only\n");
            let mut flags = String::from("event_key,flag\n");
            let mut lineups =
                String::from("game_id,player_id,side,lineup_position,start_event_id\n");

            for entry in std::fs::read_dir(&self.source_dir).unwrap() {
                let name = entry.unwrap().file_name().to_string_lossy().into_owned();
                let Some(file_year) = name.get(..4).and_then(|y| y.parse::<Year>().ok()) else {
                    continue;
                };
                if self.empty.contains(&file_year) {
                    continue;
                }
                for i in 1..=3u32 {
                    let key = u32::from(file_year.value()) * 10 + i;
                    let side = if i == 2 { "bottom" } else { "top" };
                    let _ = writeln!(events, "BOS{file_year}04060,{i},{key},1,{side},x");
                    let _ = writeln!(flags, "{key},f{i}");
                }
                let _ = writeln!(lineups, "BOS{file_year}04060,clemr001,top,1,1");
            }

            std::fs::write(output_dir.join("events.csv"), events).unwrap();
            std::fs::write(output_dir.join("event_flags.csv"), flags).unwrap();
            std::fs::write(output_dir.join("game_lineup_appearances.csv"), lineups).unwrap();
            if self.bad_auxiliary.contains(&year) {
                std::fs::write(output_dir.join("games.csv"), "venue\nFenway\n").unwrap();
            }

            Ok(TransformedPartition {
                output_dir: output_dir.to_path_buf(),
                fact_records: count_fact_records(output_dir, year)?,
            })
        }
    }

    /// Cancels the token once the load of `year` has started.
    struct CancelDuringLoad {
        year: Year,
        token: CancellationToken,
        armed: Mutex<bool>,
    }

    impl ProgressCallback for CancelDuringLoad {
        fn set_total(&self, _total: u64) {}
        fn inc(&self, _delta: u64) {
            if *self.armed.lock().unwrap() {
                self.token.cancel();
            }
        }
        fn set_message(&self, msg: String) {
            *self.armed.lock().unwrap() = msg.starts_with(&self.year.to_string());
        }
        fn finish_and_clear(&self) {}
    }

    struct Harness {
        _dir: tempfile::TempDir,
        conn: Connection,
        config: IngestConfig,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = IngestConfig {
                db_path: dir.path().join("unused.duckdb"),
                source_dir: dir.path().join("retrosheet"),
                output_root: dir.path().join("parser_output"),
                min_archive_bytes: MIN_BYTES,
                ..IngestConfig::default()
            };
            std::fs::create_dir_all(&config.source_dir).unwrap();
            let conn = open_in_memory().unwrap();
            setup_schema(&conn).unwrap();
            Self {
                _dir: dir,
                conn,
                config,
            }
        }

        fn acquirer(&self, corrupt: &[u16]) -> FakeAcquirer {
            FakeAcquirer {
                source_dir: self.config.source_dir.clone(),
                corrupt: corrupt.iter().copied().map(Year::new).collect(),
            }
        }

        fn transformer(&self) -> FakeTransformer {
            FakeTransformer {
                source_dir: self.config.source_dir.clone(),
                ..FakeTransformer::default()
            }
        }

        fn selection(newest: u16, oldest: u16) -> YearSelection {
            YearSelection::Range(YearRange::new(Year::new(newest), Year::new(oldest)).unwrap())
        }

        fn pending(&self, newest: u16, oldest: u16) -> Vec<Year> {
            pending_years(&self.conn, &Self::selection(newest, oldest))
        }

        fn count(&self, sql: &str) -> i64 {
            self.conn
                .prepare(sql)
                .unwrap()
                .query_row([], |r| r.get(0))
                .unwrap()
        }

        fn events(&self, year: u16) -> u64 {
            count_events_for_year(&self.conn, Year::new(year)).unwrap()
        }

        fn raw_files(&self, year: u16, kind: RawFileKind) -> usize {
            list_raw_files(&self.config.source_dir, Year::new(year), kind)
                .unwrap()
                .len()
        }
    }

    fn years(values: &[u16]) -> Vec<Year> {
        values.iter().copied().map(Year::new).collect()
    }

    #[tokio::test]
    async fn second_run_over_the_same_range_is_a_no_op() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let transformer = h.transformer();
        let orchestrator =
            Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, CancellationToken::new());

        let first = orchestrator.run(h.pending(1990, 1986)).await;
        assert_eq!(first.committed_years(), years(&[1990, 1989, 1988, 1987, 1986]));
        assert!(first.failed.is_empty());
        assert!(!first.interrupted);

        let pending = h.pending(1990, 1986);
        assert!(pending.is_empty());
        let second = orchestrator.run(pending).await;
        assert!(second.committed.is_empty());
        assert_eq!(transformer.calls.lock().unwrap().len(), 5);
        assert_eq!(second.year_counts, first.year_counts);
    }

    #[tokio::test]
    async fn commits_full_years_with_schema_drift() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let transformer = h.transformer();
        let orchestrator =
            Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, CancellationToken::new());

        let summary = orchestrator.run(years(&[1988, 1987])).await;

        assert_eq!(summary.committed.len(), 2);
        assert_eq!(summary.committed[0].fact_records, 3);
        // 3 events, 3 flags, 1 lineup row.
        assert_eq!(summary.committed[0].rows_loaded, 7);
        assert_eq!(summary.count_for(Year::new(1988)), 3);
        assert_eq!(summary.count_for(Year::new(1987)), 3);
        assert_eq!(
            h.count("SELECT COUNT(*) FROM event.events WHERE pitcher_id IS NULL"),
            6
        );
        assert_eq!(
            h.count("SELECT COUNT(*) FROM event.events WHERE side = 'bottom'"),
            2
        );
        assert_eq!(h.count("SELECT COUNT(*) FROM event.event_flags"), 6);
        assert_eq!(
            h.count("SELECT COUNT(*) FROM game.game_lineup_appearances"),
            2
        );

        // Event files go after commit; rosters stay.
        assert_eq!(h.raw_files(1987, RawFileKind::Event), 0);
        assert_eq!(h.raw_files(1987, RawFileKind::Roster), 1);
        assert!(!h.config.output_dir(Year::new(1987)).exists());
    }

    #[tokio::test]
    async fn corrupt_download_fails_only_that_year() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[1988]);
        let transformer = h.transformer();
        let orchestrator =
            Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, CancellationToken::new());

        let summary = orchestrator.run(h.pending(1989, 1987)).await;

        assert_eq!(summary.committed_years(), years(&[1989, 1987]));
        assert_eq!(summary.failed.len(), 1);
        let failure = &summary.failed[0];
        assert_eq!(failure.year, Year::new(1988));
        assert_eq!(failure.stage, Stage::Acquisition);
        assert!(failure.message.contains("bytes"));
        assert_eq!(h.events(1988), 0);
        assert_eq!(summary.count_for(Year::new(1988)), 0);
        assert_eq!(*transformer.calls.lock().unwrap(), years(&[1989, 1987]));

        // The failed year is retried next time.
        assert_eq!(h.pending(1989, 1987), years(&[1988]));
    }

    #[tokio::test]
    async fn failed_load_leaves_no_rows_for_the_year() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let transformer = FakeTransformer {
            bad_auxiliary: [Year::new(1988)].into_iter().collect(),
            ..h.transformer()
        };
        let orchestrator =
            Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, CancellationToken::new());

        let summary = orchestrator.run(years(&[1988, 1987])).await;

        assert_eq!(summary.failed[0].stage, Stage::Load);
        assert_eq!(summary.committed_years(), years(&[1987]));
        assert_eq!(h.events(1988), 0);
        assert_eq!(
            h.count(
                "SELECT COUNT(*) FROM event.event_flags WHERE substring(game_id, 4, 4) = '1988'"
            ),
            0
        );
        assert_eq!(h.raw_files(1988, RawFileKind::Event), 0);
        assert_eq!(h.raw_files(1988, RawFileKind::Roster), 0);
        assert!(!h.config.output_dir(Year::new(1988)).exists());
    }

    #[tokio::test]
    async fn failed_transformation_continues_with_older_years() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let transformer = FakeTransformer {
            fail: [Year::new(1989)].into_iter().collect(),
            ..h.transformer()
        };
        let orchestrator =
            Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, CancellationToken::new());

        let summary = orchestrator.run(h.pending(1989, 1988)).await;

        assert_eq!(summary.failed[0].stage, Stage::Transformation);
        assert!(summary.failed[0].rollback.is_clean());
        assert_eq!(summary.committed_years(), years(&[1988]));
        assert_eq!(h.raw_files(1989, RawFileKind::Event), 0);
    }

    #[tokio::test]
    async fn cancellation_while_loading_rolls_back_and_stops() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let transformer = h.transformer();
        let token = CancellationToken::new();
        let files = Arc::new(CancelDuringLoad {
            year: Year::new(1987),
            token: token.clone(),
            armed: Mutex::new(false),
        });
        let orchestrator =
            Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, token.clone())
                .with_progress(null_progress(), files);

        let summary = orchestrator.run(h.pending(1990, 1985)).await;

        assert!(summary.interrupted);
        assert_eq!(summary.committed_years(), years(&[1990, 1989, 1988]));
        let cancelled = summary.cancelled.as_ref().unwrap();
        assert_eq!(cancelled.year, Year::new(1987));
        assert_eq!(h.events(1987), 0);
        assert_eq!(summary.count_for(Year::new(1987)), 0);
        assert_eq!(summary.unattempted_years(), years(&[1986, 1985]));
        assert_eq!(*transformer.calls.lock().unwrap(), years(&[1990, 1989, 1988, 1987]));
        assert_eq!(h.raw_files(1987, RawFileKind::Roster), 0);

        let text = format_summary(&summary);
        assert!(text.contains("Interrupted after 3 committed year(s); 1987 rolled back"));
        assert!(text.contains("0 residual rows"));
    }

    #[tokio::test]
    async fn pre_cancelled_token_starts_nothing() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let transformer = h.transformer();
        let token = CancellationToken::new();
        token.cancel();
        let orchestrator = Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, token);

        let summary = orchestrator.run(years(&[1990, 1989])).await;

        assert!(summary.interrupted);
        assert!(summary.committed.is_empty());
        assert!(summary.failed.is_empty());
        assert!(summary.cancelled.is_none());
        assert_eq!(summary.unattempted_years(), years(&[1990, 1989]));
        assert!(transformer.calls.lock().unwrap().is_empty());
        assert!(format_summary(&summary).contains("no year was in flight"));
    }

    #[tokio::test]
    async fn stage_killed_by_the_signal_is_cancelled_not_failed() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let token = CancellationToken::new();
        let transformer = FakeTransformer {
            interrupt: Some((Year::new(1988), token.clone())),
            ..h.transformer()
        };
        let orchestrator = Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, token);

        let summary = orchestrator.run(years(&[1988, 1987, 1986])).await;

        assert!(summary.interrupted);
        assert!(summary.failed.is_empty());
        let cancelled = summary.cancelled.as_ref().unwrap();
        assert_eq!(cancelled.year, Year::new(1988));
        assert_eq!(cancelled.state, PartitionState::Transforming);
        assert!(cancelled.error.as_ref().unwrap().contains("SIGINT"));
        assert_eq!(summary.unattempted_years(), years(&[1987, 1986]));
        assert_eq!(*transformer.calls.lock().unwrap(), years(&[1988]));
        assert_eq!(h.raw_files(1988, RawFileKind::Event), 0);

        let text = format_summary(&summary);
        assert!(text.contains("1988 rolled back during TRANSFORMING"));
    }

    #[tokio::test]
    async fn empty_year_commits_and_is_not_selected_again() {
        let h = Harness::new();
        let acquirer = h.acquirer(&[]);
        let transformer = FakeTransformer {
            empty: [Year::new(1901)].into_iter().collect(),
            ..h.transformer()
        };
        let orchestrator =
            Orchestrator::new(&h.conn, &acquirer, &transformer, &h.config, CancellationToken::new());

        let summary = orchestrator.run(h.pending(1901, 1900)).await;

        assert_eq!(summary.committed_years(), years(&[1901, 1900]));
        assert_eq!(summary.committed[0].fact_records, 0);
        assert_eq!(summary.committed[0].rows_loaded, 0);
        assert!(h.pending(1901, 1900).is_empty());
    }
}
