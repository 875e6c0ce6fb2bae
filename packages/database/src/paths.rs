#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the data directory.
//!
//! All paths are relative to the project root's `data/` directory.

use std::path::{Path, PathBuf};

use retro_archive_ingest_models::Year;

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// manifest directory itself if it has no grandparent.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the path of the analytical `DuckDB` file.
#[must_use]
pub fn default_db_path() -> PathBuf {
    data_dir().join("retro_archive.duckdb")
}

/// Returns the persistent directory holding raw event and roster files.
///
/// Shared across partitions and runs; the parser always reads the whole
/// directory.
#[must_use]
pub fn source_dir() -> PathBuf {
    data_dir().join("retrosheet")
}

/// Returns the root under which per-year parser output directories live.
#[must_use]
pub fn parser_output_root() -> PathBuf {
    data_dir().join("parser_output")
}

/// Returns the parser output directory for one year under `root`.
#[must_use]
pub fn parser_output_dir(root: &Path, year: Year) -> PathBuf {
    root.join(format!("parser_output_{year}"))
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
