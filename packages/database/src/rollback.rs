//! Store-side removal of one partition.
//!
//! Every base table in the fact schemas is visited. Tables with a `game_id`
//! column lose their rows for the partition; tables without one are
//! reported as skipped rather than silently ignored. Errors never abort the
//! sweep: each is recorded in the [`RollbackReport`] and the next table is
//! tried.

use duckdb::Connection;
use retro_archive_ingest_models::{RollbackReport, TableCleanup, TableCleanupOutcome, Year};

use crate::schema::{QualifiedTable, describe_table, has_column, list_tables, partition_filter};
use crate::{FACT_SCHEMAS, GAME_ID_COLUMN, queries};

/// Deletes every stored row tagged with `year` and forgets any empty-year
/// ledger entry for it.
///
/// Idempotent: rolling back a partition with no rows reports zero deletions.
#[must_use]
pub fn delete_partition(conn: &Connection, year: Year) -> RollbackReport {
    let mut report = RollbackReport::for_year(year);
    let key = year.partition_key();

    for schema in FACT_SCHEMAS {
        let tables = match list_tables(conn, schema) {
            Ok(tables) => tables,
            Err(e) => {
                log::warn!("{year}: could not list tables in schema {schema}: {e}");
                report.errors.push(format!("list {schema}: {e}"));
                continue;
            }
        };

        for table in tables {
            let qualified = QualifiedTable::new(*schema, table);
            let outcome = delete_from_table(conn, &qualified, &key);

            match &outcome {
                TableCleanupOutcome::Deleted { rows } if *rows > 0 => {
                    log::info!("{year}: deleted {rows} rows from {qualified}");
                }
                TableCleanupOutcome::Deleted { .. } => {}
                TableCleanupOutcome::SkippedNoPartitionKey => {
                    log::warn!("{year}: {qualified} has no {GAME_ID_COLUMN} column, skipped");
                }
                TableCleanupOutcome::Failed { reason } => {
                    log::warn!("{year}: cleanup of {qualified} failed: {reason}");
                }
            }

            report.tables.push(TableCleanup {
                schema: qualified.schema,
                table: qualified.table,
                outcome,
            });
        }
    }

    match queries::remove_empty_year(conn, year) {
        Ok(true) => log::debug!("{year}: removed from empty-year ledger"),
        Ok(false) => {}
        Err(e) => {
            log::warn!("{year}: could not update empty-year ledger: {e}");
            report.errors.push(format!("ledger: {e}"));
        }
    }

    report
}

fn delete_from_table(conn: &Connection, table: &QualifiedTable, key: &str) -> TableCleanupOutcome {
    let columns = match describe_table(conn, table) {
        Ok(Some(columns)) => columns,
        Ok(None) => return TableCleanupOutcome::Deleted { rows: 0 },
        Err(e) => {
            return TableCleanupOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    if !has_column(&columns, GAME_ID_COLUMN) {
        return TableCleanupOutcome::SkippedNoPartitionKey;
    }

    let sql = format!(
        "DELETE FROM {} WHERE {}",
        table.quoted(),
        partition_filter(GAME_ID_COLUMN)
    );
    match conn.execute(&sql, [key]) {
        Ok(rows) => TableCleanupOutcome::Deleted {
            rows: u64::try_from(rows).unwrap_or(0),
        },
        Err(e) => TableCleanupOutcome::Failed {
            reason: e.to_string(),
        },
    }
}
