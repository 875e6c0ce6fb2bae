#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Partition, state, and result types for year-partitioned ingestion.
//!
//! A [`Year`] is the unit of work. Every row in the analytical store is
//! tagged with its owning year through a fixed-offset substring of the
//! composite game identifier (see [`Year::from_game_id`]).

pub mod progress;
pub mod rollback;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use rollback::{RollbackReport, TableCleanup, TableCleanupOutcome};

/// Zero-based offset of the season year inside a game identifier such as
/// `BOS198704060` (three-character home team code, then the year).
pub const GAME_ID_YEAR_OFFSET: usize = 3;

/// Length of the season year inside a game identifier.
pub const GAME_ID_YEAR_LEN: usize = 4;

/// A season year: the partition unit of ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(u16);

impl Year {
    /// Creates a year from its numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Returns the numeric value of this year.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the four-character partition key as it appears inside game
    /// identifiers (e.g. `"1987"`).
    #[must_use]
    pub fn partition_key(self) -> String {
        format!("{:04}", self.0)
    }

    /// Derives the owning year from a composite game identifier.
    ///
    /// Returns `None` if the identifier is too short or the year slice is
    /// not numeric.
    #[must_use]
    pub fn from_game_id(game_id: &str) -> Option<Self> {
        let slice = game_id.get(GAME_ID_YEAR_OFFSET..GAME_ID_YEAR_OFFSET + GAME_ID_YEAR_LEN)?;
        if !slice.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        slice.parse().ok().map(Self)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Year {
    type Err = InvalidYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u16>()
            .map(Self)
            .map_err(|_| InvalidYearError {
                value: s.to_string(),
            })
    }
}

impl From<u16> for Year {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Error returned when a string cannot be parsed as a [`Year`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid year: {value:?}")]
pub struct InvalidYearError {
    /// The rejected input.
    pub value: String,
}

/// An inclusive range of years, walked newest to oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    /// Most recent year in the range (processed first).
    pub newest: Year,
    /// Oldest year in the range (processed last).
    pub oldest: Year,
}

impl YearRange {
    /// Creates a range, rejecting `newest < oldest`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRangeError`] if the bounds are inverted.
    pub const fn new(newest: Year, oldest: Year) -> Result<Self, InvalidRangeError> {
        if newest.0 < oldest.0 {
            return Err(InvalidRangeError { newest, oldest });
        }
        Ok(Self { newest, oldest })
    }

    /// Iterates the range in strictly descending order.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = Year> + use<> {
        (self.oldest.0..=self.newest.0).rev().map(Year)
    }
}

/// Error returned when a [`YearRange`] has its bounds inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid year range: newest {newest} is older than oldest {oldest}")]
pub struct InvalidRangeError {
    /// Requested newest bound.
    pub newest: Year,
    /// Requested oldest bound.
    pub oldest: Year,
}

/// A processing stage within one partition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Retrieve and stage the raw archive.
    Acquisition,
    /// Run the external parsing engine.
    Transformation,
    /// Load transformed output into the store.
    Load,
}

impl Stage {
    /// The state a partition is in while this stage runs.
    #[must_use]
    pub const fn state(self) -> PartitionState {
        match self {
            Self::Acquisition => PartitionState::Acquiring,
            Self::Transformation => PartitionState::Transforming,
            Self::Load => PartitionState::Loading,
        }
    }
}

/// Lifecycle of one partition inside a run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionState {
    /// Not yet started.
    Pending,
    /// Downloading and extracting the raw archive.
    Acquiring,
    /// Running the external parser.
    Transforming,
    /// Loading parser output into the store.
    Loading,
    /// Fully and durably present in the store.
    Committed,
    /// All work for the partition was removed.
    RolledBack,
}

impl PartitionState {
    /// The stage executed while in this state, if any.
    #[must_use]
    pub const fn stage(self) -> Option<Stage> {
        match self {
            Self::Acquiring => Some(Stage::Acquisition),
            Self::Transforming => Some(Stage::Transformation),
            Self::Loading => Some(Stage::Load),
            Self::Pending | Self::Committed | Self::RolledBack => None,
        }
    }

    /// Whether the partition has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// A partition that reached [`PartitionState::Committed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedPartition {
    /// The committed year.
    pub year: Year,
    /// Fact records reported by the parser for this year.
    pub fact_records: u64,
    /// Rows inserted across all tables.
    pub rows_loaded: u64,
}

/// A partition that failed in one of its stages and was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPartition {
    /// The failed year.
    pub year: Year,
    /// The stage that raised the error.
    pub stage: Stage,
    /// Human-readable cause.
    pub message: String,
    /// What the rollback removed.
    pub rollback: RollbackReport,
}

/// The in-flight partition at the moment cancellation was honored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelledPartition {
    /// The interrupted year.
    pub year: Year,
    /// The state the partition was about to enter, or the state whose
    /// stage failed after the signal arrived.
    pub state: PartitionState,
    /// The stage error, when the stage failed rather than being skipped.
    pub error: Option<String>,
    /// What the rollback removed.
    pub rollback: RollbackReport,
}

/// Final per-year fact count queried from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    /// The year.
    pub year: Year,
    /// Number of primary fact rows tagged with the year.
    pub events: u64,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Years selected for processing, newest first.
    pub pending: Vec<Year>,
    /// Successfully committed partitions, in processing order.
    pub committed: Vec<CommittedPartition>,
    /// Partitions that failed and were rolled back.
    pub failed: Vec<FailedPartition>,
    /// The partition rolled back because of cancellation, if any.
    pub cancelled: Option<CancelledPartition>,
    /// Whether the run stopped early because of cancellation.
    pub interrupted: bool,
    /// Per-year fact counts present in the store at the end of the run.
    pub year_counts: Vec<YearCount>,
}

impl RunSummary {
    /// Years committed in this run.
    #[must_use]
    pub fn committed_years(&self) -> Vec<Year> {
        self.committed.iter().map(|c| c.year).collect()
    }

    /// Years that failed or were cancelled in this run, in processing order.
    #[must_use]
    pub fn rolled_back_years(&self) -> Vec<Year> {
        self.failed
            .iter()
            .map(|f| f.year)
            .chain(self.cancelled.iter().map(|c| c.year))
            .collect()
    }

    /// Years that were selected but never started.
    #[must_use]
    pub fn unattempted_years(&self) -> Vec<Year> {
        let mut attempted = self.committed_years();
        attempted.extend(self.rolled_back_years());
        self.pending
            .iter()
            .copied()
            .filter(|y| !attempted.contains(y))
            .collect()
    }

    /// Stored fact count for `year`, or zero if absent.
    #[must_use]
    pub fn count_for(&self, year: Year) -> u64 {
        self.year_counts
            .iter()
            .find(|c| c.year == year)
            .map_or(0, |c| c.events)
    }
}
