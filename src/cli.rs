//! CLI argument parsing for pdfmerge-bot.
//!
//! Every option can also be supplied through an environment variable so the
//! bot can be configured by a process supervisor.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerge::cli::Cli;
//! use clap::Parser;
//!
//! let cli = Cli::parse();
//! let config = cli.to_config().expect("invalid configuration");
//! println!("Storing documents in {}", config.work_dir.display());
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, Verbosity};
use crate::error::{MergeBotError, Result};

/// Queue PDF documents per user and merge them on request.
///
/// Reads inbound messages as JSON lines on stdin and writes outbound
/// messages as JSON lines on stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "pdfmerge-bot")]
#[command(version)]
#[command(about = "Queue PDF documents per user and merge them on request", long_about = None)]
#[command(author)]
pub struct Cli {
    /// Directory for transient documents
    ///
    /// Wiped and recreated on every start.
    #[arg(long, value_name = "DIR", env = "PDFMERGE_WORK_DIR", default_value = crate::config::DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Directory merged documents are delivered into
    #[arg(long, value_name = "DIR", env = "PDFMERGE_OUTBOX_DIR", default_value = crate::config::DEFAULT_OUTBOX_DIR)]
    pub outbox_dir: PathBuf,

    /// Number of merge jobs that may run at the same time
    #[arg(short, long, value_name = "N", env = "PDFMERGE_WORKERS", default_value_t = crate::config::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Minimum seconds between two progress updates of one transfer
    #[arg(long, value_name = "SECS", env = "PDFMERGE_PROGRESS_INTERVAL", default_value_t = 3)]
    pub progress_interval_secs: u64,

    /// Minimum number of queued documents for a merge
    #[arg(long, value_name = "N", env = "PDFMERGE_MIN_DOCUMENTS", default_value_t = crate::config::DEFAULT_MIN_DOCUMENTS)]
    pub min_documents: usize,

    /// Abort downloads that take longer than this many seconds
    ///
    /// Unset by default: downloads may take as long as they need.
    #[arg(long, value_name = "SECS", env = "PDFMERGE_DOWNLOAD_TIMEOUT")]
    pub download_timeout_secs: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Convert CLI arguments into a validated Config.
    ///
    /// # Errors
    ///
    /// Returns [`MergeBotError::InvalidConfig`] if the resulting configuration
    /// fails validation.
    pub fn to_config(&self) -> Result<Config> {
        let verbosity = if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };

        let config = Config {
            work_dir: self.work_dir.clone(),
            outbox_dir: self.outbox_dir.clone(),
            workers: self.workers,
            progress_interval: Duration::from_secs(self.progress_interval_secs),
            min_documents: self.min_documents,
            download_timeout: self.download_timeout_secs.map(Duration::from_secs),
            verbosity,
        };

        config.validate().map_err(|e| {
            MergeBotError::invalid_config(format!("Configuration validation failed: {e}"))
        })?;

        Ok(config)
    }
}
