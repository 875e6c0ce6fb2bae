//! Acquisition stage: download a year's event archive, extract it, and move
//! its event and roster files into the persistent source directory.
//!
//! The source directory accumulates across years and runs because the
//! parser always reads all of it. Files are moved in as soon as they are
//! extracted, even if a later stage fails; the rollback manager removes
//! them again for a year that does not commit.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use futures::StreamExt as _;
use regex::Regex;
use retro_archive_ingest_models::Year;
use tokio::io::AsyncWriteExt as _;

use crate::config::IngestConfig;

/// Event files: the year, anything, then `.EV` plus a league letter
/// (e.g. `1987BOS.EVA`).
static EVENT_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{4}).*\.EV.$").unwrap_or_else(|_| unreachable!()));

/// Roster files: a three-character team code, the year, `.ROS`
/// (e.g. `BOS1987.ROS`).
static ROSTER_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^.{3}(\d{4})\.ROS$").unwrap_or_else(|_| unreachable!()));

/// Kind of raw file a year contributes to the source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFileKind {
    /// Play-by-play event file. Removed once the year commits.
    Event,
    /// Team roster file. Kept after commit.
    Roster,
}

/// Classifies a file name as one of `year`'s raw files.
#[must_use]
pub fn classify_raw_file(name: &str, year: Year) -> Option<RawFileKind> {
    let matches_year = |re: &Regex| {
        re.captures(name)
            .and_then(|c| c.get(1))
            .is_some_and(|m| m.as_str() == year.partition_key())
    };

    if matches_year(&EVENT_FILE) {
        Some(RawFileKind::Event)
    } else if matches_year(&ROSTER_FILE) {
        Some(RawFileKind::Roster)
    } else {
        None
    }
}

/// Lists `year`'s files of `kind` directly inside `dir`. A missing
/// directory yields an empty list.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be read.
pub fn list_raw_files(dir: &Path, year: Year, kind: RawFileKind) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if classify_raw_file(&name.to_string_lossy(), year) == Some(kind) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Errors from the acquisition stage.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The archive is too small to be real data.
    #[error("archive {path} is only {bytes} bytes (minimum {minimum})")]
    TooSmall {
        /// Downloaded archive.
        path: String,
        /// Actual size.
        bytes: u64,
        /// Configured minimum.
        minimum: u64,
    },

    /// The archive could not be opened or extracted.
    #[error("corrupt archive {path}: {source}")]
    Archive {
        /// Archive path.
        path: String,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },

    /// I/O error on disk.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl AcquisitionError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Files a year contributed to the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquiredPartition {
    /// Event files now in the source directory.
    pub event_files: Vec<PathBuf>,
    /// Roster files now in the source directory.
    pub roster_files: Vec<PathBuf>,
    /// Size of the downloaded archive.
    pub archive_bytes: u64,
}

/// Retrieves one year's raw files.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Fetches `year` into `staging` (removed by the caller afterwards) and
    /// installs its raw files into the persistent source directory.
    async fn acquire(&self, year: Year, staging: &Path)
    -> Result<AcquiredPartition, AcquisitionError>;
}

/// Downloads archives over HTTP from `{base_url}/{year}eve.zip`.
pub struct HttpAcquirer {
    client: reqwest::Client,
    config: IngestConfig,
}

impl HttpAcquirer {
    /// Creates an acquirer from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &IngestConfig) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .user_agent("retro-archive-ingest/0.1")
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Acquirer for HttpAcquirer {
    async fn acquire(
        &self,
        year: Year,
        staging: &Path,
    ) -> Result<AcquiredPartition, AcquisitionError> {
        let archive = staging.join(format!("{year}eve.zip"));
        let bytes =
            download_archive(&self.client, &self.config.archive_url(year), &archive).await?;
        check_archive_size(&archive, bytes, self.config.min_archive_bytes)?;

        let source_dir = self.config.source_dir.clone();
        let staging = staging.to_path_buf();
        let mut acquired = tokio::task::spawn_blocking(move || {
            install_archive(&archive, year, &staging, &source_dir)
        })
        .await
        .map_err(|e| AcquisitionError::Io {
            path: self.config.source_dir.display().to_string(),
            source: std::io::Error::other(e),
        })??;

        acquired.archive_bytes = bytes;
        Ok(acquired)
    }
}

/// Streams `url` into `dest`, returning the number of bytes written.
///
/// # Errors
///
/// Returns [`AcquisitionError`] if the request fails, the status is not
/// successful, or the file cannot be written.
pub async fn download_archive(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, AcquisitionError> {
    log::info!("Downloading {url}");

    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(AcquisitionError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| AcquisitionError::io(dest, e))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| AcquisitionError::io(dest, e))?;
        downloaded += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| AcquisitionError::io(dest, e))?;

    #[allow(clippy::cast_precision_loss)]
    let kb = downloaded as f64 / 1024.0;
    log::info!("  download complete: {kb:.1} KB");

    Ok(downloaded)
}

/// Rejects archives smaller than `minimum` bytes.
///
/// # Errors
///
/// Returns [`AcquisitionError::TooSmall`] if `bytes < minimum`.
pub fn check_archive_size(path: &Path, bytes: u64, minimum: u64) -> Result<(), AcquisitionError> {
    if bytes < minimum {
        return Err(AcquisitionError::TooSmall {
            path: path.display().to_string(),
            bytes,
            minimum,
        });
    }
    Ok(())
}

/// Extracts `archive` under `staging`, moves `year`'s event and roster
/// files into `source_dir` (replacing existing copies), and deletes the
/// archive.
///
/// # Errors
///
/// Returns [`AcquisitionError`] if the archive is corrupt or any file
/// operation fails.
pub fn install_archive(
    archive: &Path,
    year: Year,
    staging: &Path,
    source_dir: &Path,
) -> Result<AcquiredPartition, AcquisitionError> {
    let extract_dir = staging.join("extracted");
    extract_zip(archive, &extract_dir)?;

    std::fs::create_dir_all(source_dir).map_err(|e| AcquisitionError::io(source_dir, e))?;

    let mut extracted = Vec::new();
    collect_files(&extract_dir, &mut extracted)?;

    let mut acquired = AcquiredPartition::default();
    let mut skipped = 0usize;

    for path in extracted {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(kind) = classify_raw_file(&name, year) else {
            skipped += 1;
            continue;
        };

        let dest = source_dir.join(&name);
        move_file(&path, &dest)?;

        match kind {
            RawFileKind::Event => acquired.event_files.push(dest),
            RawFileKind::Roster => acquired.roster_files.push(dest),
        }
    }

    std::fs::remove_file(archive).map_err(|e| AcquisitionError::io(archive, e))?;

    acquired.event_files.sort();
    acquired.roster_files.sort();

    if acquired.event_files.is_empty() {
        log::warn!("{year}: archive contained no event files");
    }
    log::info!(
        "{year}: installed {} event and {} roster files ({skipped} other entries ignored)",
        acquired.event_files.len(),
        acquired.roster_files.len(),
    );

    Ok(acquired)
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), AcquisitionError> {
    let file = std::fs::File::open(archive).map_err(|e| AcquisitionError::io(archive, e))?;

    let mut zip = zip::ZipArchive::new(file).map_err(|e| AcquisitionError::Archive {
        path: archive.display().to_string(),
        source: e,
    })?;

    zip.extract(dest).map_err(|e| AcquisitionError::Archive {
        path: archive.display().to_string(),
        source: e,
    })
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), AcquisitionError> {
    let entries = std::fs::read_dir(dir).map_err(|e| AcquisitionError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| AcquisitionError::io(dir, e))?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Renames `from` to `to`, falling back to copy-and-delete when they live
/// on different filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), AcquisitionError> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| AcquisitionError::io(to, e))?;
    std::fs::remove_file(from).map_err(|e| AcquisitionError::io(from, e))
}
