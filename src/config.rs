//! Configuration module for pdfmerge.
//!
//! This module holds the validated, normalized configuration that drives the
//! bot: where documents are stored, how many merges may run at once and how
//! often progress is reported.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MergeBotError, Result};

/// Default directory for transient input, output and trailer files.
pub const DEFAULT_WORK_DIR: &str = "downloads_mt";

/// Default directory where delivered documents are placed by the local transport.
pub const DEFAULT_OUTBOX_DIR: &str = "outbox";

/// Default number of merge jobs that may run concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Default minimum time between two progress edits of the same transfer.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

/// Default minimum queue length for a merge.
pub const DEFAULT_MIN_DOCUMENTS: usize = 2;

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Only warnings and errors.
    Quiet,
    /// Lifecycle events.
    #[default]
    Normal,
    /// Everything, including per-file details.
    Verbose,
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage area for transient files. Wiped at startup.
    pub work_dir: PathBuf,

    /// Directory the local transport delivers merged documents into.
    pub outbox_dir: PathBuf,

    /// Number of merge jobs that may run concurrently.
    pub workers: usize,

    /// Minimum time between two progress edits of the same transfer.
    pub progress_interval: Duration,

    /// Minimum number of queued documents for a merge.
    pub min_documents: usize,

    /// Optional upper bound for a single download. `None` waits forever.
    pub download_timeout: Option<Duration>,

    /// Log verbosity.
    pub verbosity: Verbosity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            outbox_dir: PathBuf::from(DEFAULT_OUTBOX_DIR),
            workers: DEFAULT_WORKERS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            min_documents: DEFAULT_MIN_DOCUMENTS,
            download_timeout: None,
            verbosity: Verbosity::Normal,
        }
    }
}

impl Config {
    /// Create a default configuration rooted at `work_dir`.
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`MergeBotError::InvalidConfig`] if:
    /// - a directory path is empty
    /// - `workers` is zero
    /// - the progress interval is zero
    /// - fewer than two documents would be enough to merge
    /// - the download timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(MergeBotError::invalid_config("Work directory cannot be empty"));
        }

        if self.outbox_dir.as_os_str().is_empty() {
            return Err(MergeBotError::invalid_config("Outbox directory cannot be empty"));
        }

        if self.workers == 0 {
            return Err(MergeBotError::invalid_config(
                "Number of workers must be at least 1",
            ));
        }

        if self.progress_interval.is_zero() {
            return Err(MergeBotError::invalid_config(
                "Progress interval must be greater than zero",
            ));
        }

        if self.min_documents < DEFAULT_MIN_DOCUMENTS {
            return Err(MergeBotError::invalid_config(format!(
                "Minimum documents must be at least {DEFAULT_MIN_DOCUMENTS}, got {}",
                self.min_documents
            )));
        }

        if let Some(timeout) = self.download_timeout
            && timeout.is_zero()
        {
            return Err(MergeBotError::invalid_config(
                "Download timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}
