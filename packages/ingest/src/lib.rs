#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resumable, year-partitioned ingestion of Retrosheet event archives into
//! the `DuckDB` analytical store.
//!
//! Each year moves through acquisition (download and extract), transformation
//! (the external parser), and load (transactional insert). A year is either
//! fully present in the store or fully absent: any failure rolls it back and
//! the run moves on to the next year; a cancellation rolls it back and stops.

pub mod acquire;
pub mod config;
pub mod load;
pub mod orchestrator;
pub mod rollback;
pub mod selector;
pub mod signal;
pub mod transform;

use retro_archive_ingest_models::{PartitionState, Stage};

pub use acquire::AcquisitionError;
pub use load::LoadError;
pub use tokio_util::sync::CancellationToken;
pub use transform::TransformationError;

/// Why a partition did not commit.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// Retrieval or extraction failed.
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// The external parser failed or produced no usable output.
    #[error("transformation failed: {0}")]
    Transformation(#[from] TransformationError),

    /// Inserting the parser output failed.
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    /// The cancellation token was set when the partition was about to enter
    /// `state` (or, for [`PartitionState::Committed`], at the commit point).
    #[error("cancelled before {state}")]
    Cancelled {
        /// The state that was not entered.
        state: PartitionState,
    },
}

impl PartitionError {
    /// The stage that raised the error; `None` for cancellation.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Acquisition(_) => Some(Stage::Acquisition),
            Self::Transformation(_) => Some(Stage::Transformation),
            Self::Load(_) => Some(Stage::Load),
            Self::Cancelled { .. } => None,
        }
    }

    /// Whether this is a cancellation rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_has_no_stage() {
        let err = PartitionError::Cancelled {
            state: PartitionState::Loading,
        };
        assert!(err.is_cancelled());
        assert_eq!(err.stage(), None);
        assert_eq!(err.to_string(), "cancelled before LOADING");
    }

    #[test]
    fn stage_errors_map_to_their_stage() {
        let err = PartitionError::from(TransformationError::MissingPrimaryOutput {
            path: "out/events.csv".to_string(),
        });
        assert_eq!(err.stage(), Some(Stage::Transformation));
        assert!(!err.is_cancelled());
    }
}
