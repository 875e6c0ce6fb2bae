#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `DuckDB` analytical store for year-partitioned event data.
//!
//! Fact tables live in two schemas, `event` and `game`. Every fact row
//! carries a `game_id` whose characters 4-7 (1-based) are the season year,
//! which is how a partition is located for filtering, counting, and
//! rollback.

pub mod load;
pub mod paths;
pub mod queries;
pub mod registry;
pub mod rollback;
pub mod schema;
pub mod store;

/// Schemas holding partition-taggable fact tables.
pub const FACT_SCHEMAS: &[&str] = &["event", "game"];

/// Column carrying the composite game identifier in every fact table.
pub const GAME_ID_COLUMN: &str = "game_id";

/// Column linking auxiliary event rows to their parent event.
pub const EVENT_KEY_COLUMN: &str = "event_key";

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (directory creation, file inspection).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transformed file has no column from which the partition can be
    /// derived, so its rows could never be rolled back.
    #[error("{file}: no `game_id` or `event_key` column to derive the partition from")]
    MissingPartitionKey {
        /// Output file name.
        file: String,
    },

    /// The transformed file and the target table share no columns.
    #[error("{file}: no columns in common with {table}")]
    NoCommonColumns {
        /// Output file name.
        file: String,
        /// Qualified target table.
        table: String,
    },

    /// The primary output file is missing from the output directory.
    #[error("primary output file not found: {path}")]
    MissingPrimaryFile {
        /// Expected path.
        path: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
