//! Connection handling and initial schema creation.
//!
//! The analytical store is a single `DuckDB` file accessed through one
//! exclusive connection for the lifetime of a run.

use std::path::Path;

use duckdb::Connection;

use crate::DbError;

/// Opens (or creates) the store at `path`.
///
/// Does not create any tables; run [`setup_schema`] once on a fresh store.
///
/// # Errors
///
/// Returns [`DbError`] if the parent directory cannot be created or the
/// connection fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;

    conn.execute_batch(
        "SET threads = 4;
         SET memory_limit = '2GB';",
    )?;

    Ok(conn)
}

/// Opens a transient in-memory store.
///
/// # Errors
///
/// Returns [`DbError`] if the connection fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    Ok(Connection::open_in_memory()?)
}

/// Creates schemas, core fact tables, and the empty-partition ledger if
/// they do not exist yet.
///
/// Never drops or alters existing objects. Auxiliary tables
/// (`event.event_*`, `game.games`) are intentionally absent: they are
/// created from the parser's inferred schema on first load.
///
/// # Errors
///
/// Returns [`DbError`] if any DDL statement fails.
pub fn setup_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SCHEMA IF NOT EXISTS event;
         CREATE SCHEMA IF NOT EXISTS game;
         CREATE SCHEMA IF NOT EXISTS info;
         CREATE SCHEMA IF NOT EXISTS box_score;

         CREATE TABLE IF NOT EXISTS event.events (
            game_id VARCHAR,
            event_id BIGINT,
            event_key BIGINT,
            inning BIGINT,
            frame VARCHAR,
            batter_lineup_position BIGINT,
            batter_id VARCHAR,
            pitcher_id VARCHAR,
            batting_team_id VARCHAR,
            fielding_team_id VARCHAR,
            outs BIGINT,
            base_state BIGINT,
            count_balls BIGINT,
            count_strikes BIGINT,
            specified_batter_hand VARCHAR,
            specified_pitcher_hand VARCHAR,
            strikeout_responsible_batter_id VARCHAR,
            walk_responsible_pitcher_id VARCHAR,
            plate_appearance_result VARCHAR,
            batted_trajectory VARCHAR,
            batted_to_fielder BIGINT,
            batted_location_general VARCHAR,
            batted_location_depth VARCHAR,
            batted_location_angle VARCHAR,
            batted_contact_strength VARCHAR,
            outs_on_play BIGINT,
            runs_on_play BIGINT,
            runs_batted_in BIGINT,
            team_unearned_runs BIGINT,
            no_play_flag BOOLEAN,
            side ENUM('top', 'bottom')
         );

         CREATE TABLE IF NOT EXISTS game.game_lineup_appearances (
            game_id VARCHAR,
            player_id VARCHAR,
            side ENUM('top', 'bottom'),
            lineup_position UTINYINT,
            entered_game_as VARCHAR,
            start_event_id UTINYINT,
            end_event_id UTINYINT
         );

         CREATE TABLE IF NOT EXISTS game.game_fielding_appearances (
            game_id VARCHAR,
            player_id VARCHAR,
            side ENUM('top', 'bottom'),
            fielding_position UTINYINT,
            start_event_id UTINYINT,
            end_event_id UTINYINT
         );

         CREATE TABLE IF NOT EXISTS game.game_earned_runs (
            game_id VARCHAR,
            player_id VARCHAR,
            earned_runs UTINYINT
         );

         CREATE TABLE IF NOT EXISTS main._ingest_empty_years (
            year INTEGER PRIMARY KEY,
            recorded_at TIMESTAMP NOT NULL DEFAULT current_timestamp
         );",
    )?;

    log::info!("Store schema is in place");
    Ok(())
}
