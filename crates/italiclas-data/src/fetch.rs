//! Raw data download.
//!
//! The upstream source serves a ZIP archive with a single CSV inside. The
//! [`Fetcher`] downloads it once, extracts the configured entry and stores
//! it at the raw data path; later calls reuse that file unless forced.
//!
//! A non-success HTTP status is not an error: it is reported as
//! [`FetchOutcome::Unavailable`] so that callers can tell "no data yet"
//! apart from a crash and retry later.

use crate::error::{EtlError, Result};
use reqwest::blocking::Client;
use std::fs;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{error, info};
use zip::ZipArchive;
use zip::result::ZipError;

/// Default request timeout (connect and body), in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Default upstream dataset.
pub const DEFAULT_SOURCE_URL: &str =
    "https://www.kaggle.com/api/v1/datasets/download/basilb2s/language-detection";

/// Name of the CSV entry inside the default upstream archive.
pub const DEFAULT_ENTRY_NAME: &str = "Language Detection.csv";

/// Result of a [`Fetcher::fetch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was already present; no network call was made.
    Cached(PathBuf),
    /// The archive was downloaded and the entry extracted.
    Downloaded(PathBuf),
    /// The source answered with a non-success status.
    Unavailable { status: u16 },
}

impl FetchOutcome {
    /// Path to the raw data, unless the source was unavailable.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Cached(path) | Self::Downloaded(path) => Some(path),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.path().is_some()
    }
}

/// Downloads the raw dataset archive and extracts one entry from it.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    entry_name: String,
    timeout_secs: u64,
}

impl Fetcher {
    /// Create a fetcher for `entry_name` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(entry_name: impl Into<String>) -> Result<Self> {
        Self::with_timeout(entry_name, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a fetcher with a custom timeout in seconds.
    pub fn with_timeout(entry_name: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            entry_name: entry_name.into(),
            timeout_secs,
        })
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Make sure raw data exists at `dest`, downloading it from `url` when
    /// missing or when `force` is set.
    ///
    /// # Errors
    ///
    /// - [`EtlError::UpstreamTimeout`] if the request times out
    /// - [`EtlError::Archive`] if the body is not a ZIP archive
    /// - [`EtlError::ArchiveEntryMissing`] if the entry is not in the archive
    /// - [`EtlError::Io`] if `dest` cannot be written
    pub fn fetch(&self, url: &str, dest: &Path, force: bool) -> Result<FetchOutcome> {
        if !force && dest.is_file() {
            info!("[ETL] Raw data already present in '{}'", dest.display());
            return Ok(FetchOutcome::Cached(dest.to_path_buf()));
        }

        let start = Instant::now();
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            error!("[ETL] Could not get raw data from {}: HTTP {}", url, status);
            return Ok(FetchOutcome::Unavailable {
                status: status.as_u16(),
            });
        }

        info!("[ETL] Fetching raw data from {}", url);
        let mut archive_file = tempfile::tempfile()?;
        response
            .copy_to(&mut archive_file)
            .map_err(|e| self.request_error(url, e))?;
        archive_file.seek(SeekFrom::Start(0))?;

        let mut archive = ZipArchive::new(archive_file)?;
        let mut entry = match archive.by_name(&self.entry_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(EtlError::ArchiveEntryMissing {
                    url: url.to_string(),
                    entry: self.entry_name.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let mut out = NamedTempFile::new_in(parent)?;
        let bytes = io::copy(&mut entry, &mut out)?;
        // A truncated file would count as a cache hit on the next run
        out.as_file().sync_all()?;
        out.persist(dest).map_err(|e| e.error)?;

        info!(
            "[ETL] Saved raw data to '{}' ({} bytes) in {:.2?}",
            dest.display(),
            bytes,
            start.elapsed()
        );
        Ok(FetchOutcome::Downloaded(dest.to_path_buf()))
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> EtlError {
        if err.is_timeout() {
            EtlError::UpstreamTimeout {
                url: url.to_string(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            EtlError::HttpRequest(err)
        }
    }
}
