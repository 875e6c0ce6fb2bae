//! Chooses which years still need to be ingested.

use std::collections::BTreeSet;

use duckdb::Connection;
use retro_archive_database::queries;
use retro_archive_ingest_models::{Year, YearRange};

/// The years a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearSelection {
    /// Every year in an inclusive range.
    Range(YearRange),
    /// An explicit set of years.
    Years(BTreeSet<Year>),
}

impl YearSelection {
    /// Targeted years, newest first.
    #[must_use]
    pub fn newest_first(&self) -> Vec<Year> {
        match self {
            Self::Range(range) => range.iter_newest_first().collect(),
            Self::Years(years) => years.iter().rev().copied().collect(),
        }
    }
}

/// Years of `selection` not in `existing`, strictly descending.
#[must_use]
pub fn select_pending(selection: &YearSelection, existing: &BTreeSet<Year>) -> Vec<Year> {
    selection
        .newest_first()
        .into_iter()
        .filter(|year| !existing.contains(year))
        .collect()
}

/// Reads the committed years from the store. A failed query (for example
/// on a store that was never set up) counts as "nothing present".
#[must_use]
pub fn existing_years(conn: &Connection) -> BTreeSet<Year> {
    let mut years = match queries::loaded_years(conn) {
        Ok(years) => years,
        Err(e) => {
            log::warn!("Could not read loaded years, assuming none: {e}");
            BTreeSet::new()
        }
    };

    match queries::empty_years(conn) {
        Ok(empty) => years.extend(empty),
        Err(e) => log::debug!("No empty-year ledger available: {e}"),
    }

    years
}

/// Years of `selection` still missing from the store, newest first.
#[must_use]
pub fn pending_years(conn: &Connection, selection: &YearSelection) -> Vec<Year> {
    let existing = existing_years(conn);
    let pending = select_pending(selection, &existing);
    log::info!(
        "{} year(s) already present, {} pending",
        existing.len(),
        pending.len()
    );
    pending
}
