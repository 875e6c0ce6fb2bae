//! Run configuration.
//!
//! Values are layered: built-in defaults rooted at the workspace `data/`
//! directory, then an optional TOML file, then `RETRO_ARCHIVE_*`
//! environment variables. Command-line flags are applied last by the
//! binary.

use std::path::{Path, PathBuf};

use retro_archive_database::paths;
use retro_archive_ingest_models::{InvalidRangeError, Year, YearRange};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`IngestConfig::db_path`].
pub const ENV_DB: &str = "RETRO_ARCHIVE_DB";
/// Environment variable overriding [`IngestConfig::source_dir`].
pub const ENV_SOURCE_DIR: &str = "RETRO_ARCHIVE_SOURCE_DIR";
/// Environment variable overriding [`IngestConfig::parser`].
pub const ENV_PARSER: &str = "RETRO_ARCHIVE_PARSER";
/// Environment variable overriding [`IngestConfig::base_url`].
pub const ENV_BASE_URL: &str = "RETRO_ARCHIVE_BASE_URL";

/// Where yearly event archives are published.
pub const DEFAULT_BASE_URL: &str = "https://www.retrosheet.org/events";

/// Archives smaller than this are treated as failed downloads.
pub const DEFAULT_MIN_ARCHIVE_BYTES: u64 = 1000;

/// Parser executable looked up on `PATH` when none is configured.
pub const DEFAULT_PARSER: &str = "baseball-computer";

/// Newest season targeted by default.
pub const DEFAULT_NEWEST_YEAR: u16 = 2024;

/// Oldest season targeted by default.
pub const DEFAULT_OLDEST_YEAR: u16 = 1900;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`IngestConfig`].
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config file path.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The configured year bounds are inverted.
    #[error(transparent)]
    Range(#[from] InvalidRangeError),

    /// The minimum archive size must be positive.
    #[error("min_archive_bytes must be greater than zero")]
    ZeroMinArchiveBytes,
}

/// Everything a run needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Analytical store file.
    pub db_path: PathBuf,
    /// Persistent directory of raw event and roster files.
    pub source_dir: PathBuf,
    /// Parent of the per-year parser output directories.
    pub output_root: PathBuf,
    /// Parser executable.
    pub parser: PathBuf,
    /// Working directory for the parser, if it needs one.
    pub parser_dir: Option<PathBuf>,
    /// Base URL; archives are fetched from `{base_url}/{year}eve.zip`.
    pub base_url: String,
    /// Smallest plausible archive, in bytes.
    pub min_archive_bytes: u64,
    /// Newest targeted year (processed first).
    pub newest_year: Year,
    /// Oldest targeted year (processed last).
    pub oldest_year: Year,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            db_path: paths::default_db_path(),
            source_dir: paths::source_dir(),
            output_root: paths::parser_output_root(),
            parser: PathBuf::from(DEFAULT_PARSER),
            parser_dir: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            min_archive_bytes: DEFAULT_MIN_ARCHIVE_BYTES,
            newest_year: Year::new(DEFAULT_NEWEST_YEAR),
            oldest_year: Year::new(DEFAULT_OLDEST_YEAR),
        }
    }
}

impl IngestConfig {
    /// Builds the configuration from defaults, an optional TOML file, and
    /// the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or the
    /// result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Overrides fields from `RETRO_ARCHIVE_*` variables, read through
    /// `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(ENV_DB) {
            self.db_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_SOURCE_DIR) {
            self.source_dir = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_PARSER) {
            self.parser = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_BASE_URL) {
            self.base_url = value.trim_end_matches('/').to_string();
        }
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the year bounds are inverted or the
    /// minimum archive size is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.year_range()?;
        if self.min_archive_bytes == 0 {
            return Err(ConfigError::ZeroMinArchiveBytes);
        }
        Ok(())
    }

    /// The targeted years as a range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRangeError`] if `newest_year < oldest_year`.
    pub const fn year_range(&self) -> Result<YearRange, InvalidRangeError> {
        YearRange::new(self.newest_year, self.oldest_year)
    }

    /// The archive URL for `year`.
    #[must_use]
    pub fn archive_url(&self, year: Year) -> String {
        format!("{}/{year}eve.zip", self.base_url.trim_end_matches('/'))
    }

    /// The parser output directory for `year`.
    #[must_use]
    pub fn output_dir(&self, year: Year) -> PathBuf {
        paths::parser_output_dir(&self.output_root, year)
    }
}
