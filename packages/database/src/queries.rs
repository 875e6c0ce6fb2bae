//! Read-side queries over the store: which partitions are present and how
//! many fact records each holds.

use std::collections::BTreeSet;

use duckdb::Connection;
use retro_archive_ingest_models::{Year, YearCount};

use crate::DbError;

/// Years with at least one row in `event.events`.
///
/// # Errors
///
/// Returns [`DbError`] if the events table is missing or the query fails.
/// Callers deciding what to ingest treat this as "nothing loaded yet".
pub fn loaded_years(conn: &Connection) -> Result<BTreeSet<Year>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT substring(CAST(game_id AS VARCHAR), 4, 4)
         FROM event.events
         WHERE game_id IS NOT NULL",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut years = BTreeSet::new();
    for row in rows {
        let key = row?;
        match key.parse::<Year>() {
            Ok(year) => {
                years.insert(year);
            }
            Err(e) => log::warn!("Ignoring unparseable partition key {key:?}: {e}"),
        }
    }
    Ok(years)
}

/// Years recorded as committed with zero fact records.
///
/// # Errors
///
/// Returns [`DbError`] if the ledger query fails.
pub fn empty_years(conn: &Connection) -> Result<BTreeSet<Year>, DbError> {
    let mut stmt = conn.prepare("SELECT year FROM main._ingest_empty_years")?;
    let rows = stmt.query_map([], |row| row.get::<_, i32>(0))?;

    let mut years = BTreeSet::new();
    for row in rows {
        let value = row?;
        let year = u16::try_from(value).map_err(|e| DbError::Conversion {
            message: format!("ledger year {value} out of range: {e}"),
        })?;
        years.insert(Year::new(year));
    }
    Ok(years)
}

/// Every committed year: loaded years plus empty years from the ledger.
///
/// # Errors
///
/// Returns [`DbError`] if either query fails.
pub fn existing_years(conn: &Connection) -> Result<BTreeSet<Year>, DbError> {
    let mut years = loaded_years(conn)?;
    years.extend(empty_years(conn)?);
    Ok(years)
}

/// Records `year` as committed with zero fact records.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn record_empty_year(conn: &Connection, year: Year) -> Result<(), DbError> {
    conn.execute(
        "INSERT OR IGNORE INTO main._ingest_empty_years (year) VALUES (?)",
        [i32::from(year.value())],
    )?;
    Ok(())
}

/// Removes `year` from the empty-partition ledger, returning whether it was
/// present.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn remove_empty_year(conn: &Connection, year: Year) -> Result<bool, DbError> {
    let removed = conn.execute(
        "DELETE FROM main._ingest_empty_years WHERE year = ?",
        [i32::from(year.value())],
    )?;
    Ok(removed > 0)
}

/// Number of `event.events` rows for one partition.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_events_for_year(conn: &Connection, year: Year) -> Result<u64, DbError> {
    let count: i64 = conn
        .prepare(
            "SELECT COUNT(*) FROM event.events
             WHERE substring(CAST(game_id AS VARCHAR), 4, 4) = ?",
        )?
        .query_row([year.partition_key()], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Event counts per loaded year, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn year_counts(conn: &Connection) -> Result<Vec<YearCount>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT substring(CAST(game_id AS VARCHAR), 4, 4) AS year, COUNT(*) AS events
         FROM event.events
         WHERE game_id IS NOT NULL
         GROUP BY 1
         ORDER BY 1 DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = Vec::new();
    for row in rows {
        let (key, events) = row?;
        let year = match key.parse::<Year>() {
            Ok(year) => year,
            Err(e) => {
                log::warn!("Ignoring unparseable partition key {key:?}: {e}");
                continue;
            }
        };
        counts.push(YearCount {
            year,
            events: u64::try_from(events).unwrap_or(0),
        });
    }
    Ok(counts)
}
