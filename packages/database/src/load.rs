//! Transactional load of one partition's parser output.
//!
//! A [`PartitionLoad`] wraps every file of a partition in a single store
//! transaction. Each file is read into a temporary staging table with
//! inferred types, filtered down to the partition, and either inserted into
//! the existing target through [`crate::schema::negotiate`] or used to
//! create the target from its inferred schema. Dropping a load that was
//! never committed rolls the transaction back.

use std::path::Path;

use duckdb::Connection;
use retro_archive_ingest_models::Year;

use crate::registry::OutputFile;
use crate::schema::{
    ColumnInfo, QualifiedTable, describe_relation, describe_table, has_column, negotiate,
    partition_filter, quote_ident, quote_literal, render_insert,
};
use crate::{DbError, EVENT_KEY_COLUMN, GAME_ID_COLUMN};

/// Staging table kept for the whole transaction so auxiliary files can be
/// tagged with their partition.
const EVENTS_STAGE: &str = "__stage_events";

/// Outcome of loading one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoad {
    /// Output file name (without extension).
    pub file: &'static str,
    /// Target table.
    pub table: QualifiedTable,
    /// Rows inserted for the partition.
    pub rows: u64,
    /// Whether the target table was created from the inferred schema.
    pub created: bool,
    /// Whether rows were tagged through the events staging table.
    pub tagged_via_event_key: bool,
}

/// An open partition load. Call [`commit`](Self::commit) to make the rows
/// visible; anything else discards them.
pub struct PartitionLoad<'a> {
    conn: &'a Connection,
    year: Year,
    key: String,
    events_staged: bool,
    staged: Vec<String>,
    open: bool,
}

impl<'a> PartitionLoad<'a> {
    /// Starts the transaction for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the transaction cannot be started.
    pub fn begin(conn: &'a Connection, year: Year) -> Result<Self, DbError> {
        conn.execute_batch("BEGIN TRANSACTION")?;
        log::debug!("{year}: load transaction started");

        Ok(Self {
            conn,
            year,
            key: year.partition_key(),
            events_staged: false,
            staged: Vec::new(),
            open: true,
        })
    }

    /// The partition being loaded.
    #[must_use]
    pub const fn year(&self) -> Year {
        self.year
    }

    /// Loads one output file from `dir`.
    ///
    /// Returns `Ok(None)` when a secondary file is absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the primary file is missing, the file exposes
    /// no partition key, it shares no columns with its target, or any
    /// statement fails.
    pub fn load_file(&mut self, file: &OutputFile, dir: &Path) -> Result<Option<FileLoad>, DbError> {
        let path = dir.join(file.file_name());

        if !path.exists() {
            if file.primary {
                return Err(DbError::MissingPrimaryFile {
                    path: path.display().to_string(),
                });
            }
            log::debug!("{}: {} not produced, skipping", self.year, file.file_name());
            return Ok(None);
        }

        if std::fs::metadata(&path)?.len() == 0 {
            log::warn!("{}: {} is empty, skipping", self.year, file.file_name());
            return Ok(None);
        }

        let stage = if file.primary {
            EVENTS_STAGE.to_string()
        } else {
            format!("__stage_{}", file.name)
        };
        self.stage_csv(&stage, &path)?;

        let stage_columns = describe_relation(self.conn, &quote_ident(&stage))?;

        let (relation, tagged) = if has_column(&stage_columns, GAME_ID_COLUMN) {
            (stage.clone(), false)
        } else if !file.primary
            && self.events_staged
            && has_column(&stage_columns, EVENT_KEY_COLUMN)
        {
            (self.tag_via_events(&stage)?, true)
        } else {
            return Err(DbError::MissingPartitionKey {
                file: file.file_name(),
            });
        };

        if file.primary {
            self.events_staged = true;
        }

        let source_columns = if tagged {
            describe_relation(self.conn, &quote_ident(&relation))?
        } else {
            stage_columns
        };

        let table = file.table();
        let (rows, created) = match describe_table(self.conn, &table)? {
            Some(target_columns) => (
                self.insert_negotiated(file, &table, &target_columns, &source_columns, &relation)?,
                false,
            ),
            None => (self.create_from_inferred(&table, &relation)?, true),
        };

        if created {
            log::info!(
                "{}: created {table} from inferred schema ({rows} rows)",
                self.year
            );
        } else {
            log::info!("{}: loaded {rows} rows into {table}", self.year);
        }

        if !file.primary {
            self.drop_staged(&relation)?;
            if relation != stage {
                self.drop_staged(&stage)?;
            }
        }

        Ok(Some(FileLoad {
            file: file.name,
            table,
            rows,
            created,
            tagged_via_event_key: tagged,
        }))
    }

    /// Commits the partition.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if cleanup of staging tables or the commit
    /// fails; the transaction is rolled back in that case.
    pub fn commit(mut self) -> Result<(), DbError> {
        for stage in std::mem::take(&mut self.staged) {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&stage)))?;
        }
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        log::debug!("{}: load transaction committed", self.year);
        Ok(())
    }

    /// Rolls the partition back explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the rollback statement fails.
    pub fn abort(mut self) -> Result<(), DbError> {
        self.open = false;
        self.conn.execute_batch("ROLLBACK")?;
        log::debug!("{}: load transaction rolled back", self.year);
        Ok(())
    }

    fn stage_csv(&mut self, stage: &str, path: &Path) -> Result<(), DbError> {
        self.conn.execute_batch(&format!(
            "CREATE OR REPLACE TEMP TABLE {} AS
             SELECT * FROM read_csv_auto({}, ignore_errors = true)",
            quote_ident(stage),
            quote_literal(&path.display().to_string()),
        ))?;
        if !self.staged.iter().any(|s| s == stage) {
            self.staged.push(stage.to_string());
        }
        Ok(())
    }

    /// Adds `game_id` to a staged file that only links to events through
    /// `event_key`, so the stored rows carry their own partition key.
    fn tag_via_events(&mut self, stage: &str) -> Result<String, DbError> {
        let tagged = format!("{stage}_tagged");
        let event_key = quote_ident(EVENT_KEY_COLUMN);
        let game_id = quote_ident(GAME_ID_COLUMN);

        self.conn.execute_batch(&format!(
            "CREATE OR REPLACE TEMP TABLE {tagged_q} AS
             SELECT s.*, e.{game_id}
             FROM {stage_q} AS s
             JOIN (SELECT DISTINCT {event_key}, {game_id} FROM {events_q}) AS e
               ON s.{event_key} = e.{event_key}",
            tagged_q = quote_ident(&tagged),
            stage_q = quote_ident(stage),
            events_q = quote_ident(EVENTS_STAGE),
        ))?;
        self.staged.push(tagged.clone());
        Ok(tagged)
    }

    fn insert_negotiated(
        &self,
        file: &OutputFile,
        table: &QualifiedTable,
        target_columns: &[ColumnInfo],
        source_columns: &[ColumnInfo],
        relation: &str,
    ) -> Result<u64, DbError> {
        let mappings = negotiate(target_columns, source_columns, &file.transform);

        if !mappings.iter().any(|m| m.target.eq_ignore_ascii_case(GAME_ID_COLUMN)) {
            return Err(DbError::NoCommonColumns {
                file: file.file_name(),
                table: table.to_string(),
            });
        }

        let dropped: Vec<&str> = source_columns
            .iter()
            .filter(|c| {
                !mappings
                    .iter()
                    .any(|m| m.source.column().eq_ignore_ascii_case(&c.name))
            })
            .map(|c| c.name.as_str())
            .collect();
        if !dropped.is_empty() {
            log::debug!("{}: {table} ignores source columns {dropped:?}", self.year);
        }

        let sql = render_insert(table, &quote_ident(relation), &mappings, file.transform.dedupe);
        let rows = self.conn.execute(&sql, [self.key.as_str()])?;
        Ok(u64::try_from(rows).unwrap_or(0))
    }

    fn create_from_inferred(&self, table: &QualifiedTable, relation: &str) -> Result<u64, DbError> {
        self.conn.execute_batch(&format!(
            "CREATE SCHEMA IF NOT EXISTS {schema};
             CREATE TABLE {target} AS SELECT * FROM {source} LIMIT 0;",
            schema = quote_ident(&table.schema),
            target = table.quoted(),
            source = quote_ident(relation),
        ))?;

        let rows = self.conn.execute(
            &format!(
                "INSERT INTO {} SELECT * FROM {} WHERE {}",
                table.quoted(),
                quote_ident(relation),
                partition_filter(GAME_ID_COLUMN),
            ),
            [self.key.as_str()],
        )?;
        Ok(u64::try_from(rows).unwrap_or(0))
    }

    fn drop_staged(&mut self, stage: &str) -> Result<(), DbError> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(stage)))?;
        self.staged.retain(|s| s != stage);
        Ok(())
    }
}

impl Drop for PartitionLoad<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("{}: rollback of abandoned load failed: {e}", self.year);
            } else {
                log::debug!("{}: abandoned load rolled back", self.year);
            }
        }
    }
}
