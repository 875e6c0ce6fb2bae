//! Transformation stage: run the external parser over the whole source
//! directory and count the fact records it produced for the year.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use retro_archive_database::{GAME_ID_COLUMN, registry};
use retro_archive_ingest_models::Year;

use crate::config::IngestConfig;

/// Lines of parser stderr kept in a [`TransformationError::Failed`].
const STDERR_TAIL_LINES: usize = 20;

/// Errors from the transformation stage.
#[derive(Debug, thiserror::Error)]
pub enum TransformationError {
    /// The parser could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Parser executable.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The parser exited unsuccessfully.
    #[error("parser exited with {status}: {stderr}")]
    Failed {
        /// Exit status as printed by the OS.
        status: String,
        /// Tail of the parser's stderr.
        stderr: String,
    },

    /// The parser exited successfully without writing the primary file.
    #[error("parser produced no primary output at {path}")]
    MissingPrimaryOutput {
        /// Expected path.
        path: String,
    },

    /// The primary output could not be scanned.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Output file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error preparing the output directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A year's parser output, ready to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedPartition {
    /// Directory holding the output files.
    pub output_dir: PathBuf,
    /// Primary rows tagged with the year. Zero is a valid, empty year.
    pub fact_records: u64,
}

/// Turns the source directory into tabular output for one year.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Writes `year`'s output files into `output_dir`.
    async fn transform(
        &self,
        year: Year,
        output_dir: &Path,
    ) -> Result<TransformedPartition, TransformationError>;
}

/// Runs the external parser as a subprocess.
pub struct ParserTransformer {
    parser: PathBuf,
    parser_dir: Option<PathBuf>,
    source_dir: PathBuf,
}

impl ParserTransformer {
    /// Creates a transformer from the run configuration.
    #[must_use]
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            parser: config.parser.clone(),
            parser_dir: config.parser_dir.clone(),
            source_dir: config.source_dir.clone(),
        }
    }
}

#[async_trait]
impl Transformer for ParserTransformer {
    async fn transform(
        &self,
        year: Year,
        output_dir: &Path,
    ) -> Result<TransformedPartition, TransformationError> {
        reset_dir(output_dir).await?;

        let mut cmd = tokio::process::Command::new(&self.parser);
        cmd.arg("--input")
            .arg(&self.source_dir)
            .arg("--output-dir")
            .arg(output_dir);
        if let Some(dir) = &self.parser_dir {
            cmd.current_dir(dir);
        }
        // Keep a terminal Ctrl-C from reaching the parser; cancellation is
        // honored between stages.
        #[cfg(unix)]
        cmd.process_group(0);

        log::info!(
            "{year}: running {} over {}",
            self.parser.display(),
            self.source_dir.display()
        );

        let output = cmd
            .output()
            .await
            .map_err(|e| TransformationError::Spawn {
                program: self.parser.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(TransformationError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let fact_records = count_fact_records(output_dir, year)?;
        Ok(TransformedPartition {
            output_dir: output_dir.to_path_buf(),
            fact_records,
        })
    }
}

/// Replaces `dir` with an empty directory.
async fn reset_dir(dir: &Path) -> Result<(), TransformationError> {
    let io = |e| TransformationError::Io {
        path: dir.display().to_string(),
        source: e,
    };
    if tokio::fs::try_exists(dir).await.map_err(io)? {
        tokio::fs::remove_dir_all(dir).await.map_err(io)?;
    }
    tokio::fs::create_dir_all(dir).await.map_err(io)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Counts the primary output rows in `output_dir` that belong to `year`.
///
/// The parser reads every year in the source directory, so rows for other
/// years are expected and ignored. Without a `game_id` column every data
/// row is counted.
///
/// # Errors
///
/// Returns [`TransformationError::MissingPrimaryOutput`] if the primary file
/// is absent, or [`TransformationError::Csv`] if it cannot be read.
pub fn count_fact_records(output_dir: &Path, year: Year) -> Result<u64, TransformationError> {
    let path = output_dir.join(registry::EVENTS.file_name());
    if !path.exists() {
        return Err(TransformationError::MissingPrimaryOutput {
            path: path.display().to_string(),
        });
    }

    let csv_err = |e| TransformationError::Csv {
        path: path.display().to_string(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&path)
        .map_err(csv_err)?;

    let game_id_index = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.eq_ignore_ascii_case(GAME_ID_COLUMN));

    let mut count = 0u64;
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let in_year = game_id_index.is_none_or(|i| {
            record
                .get(i)
                .and_then(Year::from_game_id)
                .is_some_and(|y| y == year)
        });
        if in_year {
            count += 1;
        }
    }

    if count == 0 {
        log::warn!("{year}: parser output has no records for this year");
    } else {
        log::info!("{year}: parser produced {count} records");
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_the_years_rows() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("events.csv"),
            "game_id,event_id\nBOS198704060,1\nBOS198704060,2\nNYA198604070,1\n",
        )
        .unwrap();

        assert_eq!(count_fact_records(dir.path(), Year::new(1987)).unwrap(), 2);
        assert_eq!(count_fact_records(dir.path(), Year::new(1950)).unwrap(), 0);
    }

    #[test]
    fn missing_primary_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            count_fact_records(dir.path(), Year::new(1987)),
            Err(TransformationError::MissingPrimaryOutput { .. })
        ));
    }

    #[test]
    fn keeps_the_end_of_stderr() {
        let stderr: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[tokio::test]
    async fn unknown_parser_is_a_spawn_error() {
        let out = tempfile::tempdir().unwrap();
        let config = IngestConfig {
            parser: PathBuf::from("/nonexistent/retro-parser"),
            source_dir: out.path().join("source"),
            ..IngestConfig::default()
        };
        let err = ParserTransformer::new(&config)
            .transform(Year::new(1987), &out.path().join("parser_output_1987"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformationError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let out = tempfile::tempdir().unwrap();
        let config = IngestConfig {
            parser: PathBuf::from("false"),
            source_dir: out.path().join("source"),
            ..IngestConfig::default()
        };
        let output_dir = out.path().join("parser_output_1987");
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::write(output_dir.join("events.csv"), "stale").unwrap();

        let err = ParserTransformer::new(&config)
            .transform(Year::new(1987), &output_dir)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformationError::Failed { .. }));
        assert!(!output_dir.join("events.csv").exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn parser_runs_in_its_own_process_group() {
        use std::os::unix::fs::PermissionsExt as _;

        let out = tempfile::tempdir().unwrap();
        let parser = out.path().join("parser.sh");
        std::fs::write(
            &parser,
            "#!/bin/sh\n\
             pgid=$(cut -d' ' -f5 /proc/$$/stat)\n\
             if [ \"$pgid\" = \"$$\" ]; then echo own > \"$4/group\"; else echo shared > \"$4/group\"; fi\n\
             printf 'game_id,event_id\\nBOS198704060,1\\n' > \"$4/events.csv\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&parser, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = IngestConfig {
            parser,
            source_dir: out.path().join("source"),
            ..IngestConfig::default()
        };
        let output_dir = out.path().join("parser_output_1987");

        let transformed = ParserTransformer::new(&config)
            .transform(Year::new(1987), &output_dir)
            .await
            .unwrap();

        assert_eq!(transformed.fact_records, 1);
        assert_eq!(
            std::fs::read_to_string(output_dir.join("group")).unwrap().trim(),
            "own"
        );
    }
}
