//! Error types for pdfmerge.
//!
//! Errors fall into three groups:
//!
//! - **Validation errors**: detected synchronously by the session manager and
//!   reported to the user without side effects (busy session, wrong file type,
//!   not enough documents).
//! - **Job errors**: download and merge failures. The session is rolled back to
//!   idle and every partial artifact is released before the error is reported.
//! - **Infrastructure errors**: configuration, transport and I/O failures.

use std::io;
use std::path::PathBuf;

/// Result type alias for pdfmerge operations.
pub type Result<T> = std::result::Result<T, MergeBotError>;

/// Main error type for pdfmerge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeBotError {
    /// Invalid configuration. Fatal at startup.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// The session is naming or merging and cannot accept the request.
    #[error("Session is busy with another operation")]
    SessionBusy,

    /// The received file is not a PDF document.
    #[error("Invalid document type: {name}")]
    InvalidDocumentType {
        /// Declared name of the rejected file.
        name: String,
    },

    /// A download finished without producing a usable file.
    #[error("Download is empty or corrupt: {}", .path.display())]
    EmptyOrCorruptDownload {
        /// Storage path the download was written to.
        path: PathBuf,
    },

    /// A merge was requested with too few queued documents.
    #[error("At least {required} documents are required, {queued} queued")]
    InsufficientDocuments {
        /// Number of documents currently queued.
        queued: usize,
        /// Minimum number of documents for a merge.
        required: usize,
    },

    /// None of the merge inputs exist with a non-zero size.
    #[error("No valid PDF files found to merge")]
    NoValidDocuments,

    /// Merge operation failed.
    #[error("Merge operation failed: {reason}")]
    MergeFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Failed to load a PDF file.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", .path.display())]
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to write the merged output.
    #[error("Failed to write to output file: {}\n  Reason: {source}", .path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A transport operation failed.
    #[error("Transport error during {operation}: {reason}")]
    Transport {
        /// Name of the failed operation.
        operation: &'static str,
        /// Details reported by the transport.
        reason: String,
    },

    /// The transport no longer knows the referenced message.
    #[error("Message not found")]
    MessageNotFound,

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
}

impl From<lopdf::Error> for MergeBotError {
    fn from(err: lopdf::Error) -> Self {
        Self::merge_failed(err.to_string())
    }
}

impl MergeBotError {
    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an InvalidDocumentType error.
    pub fn invalid_document_type(name: impl Into<String>) -> Self {
        Self::InvalidDocumentType { name: name.into() }
    }

    /// Create an EmptyOrCorruptDownload error.
    pub fn empty_download(path: PathBuf) -> Self {
        Self::EmptyOrCorruptDownload { path }
    }

    /// Create a MergeFailed error.
    pub fn merge_failed(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
        }
    }

    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path,
            reason: reason.into(),
        }
    }

    /// Create a Transport error.
    pub fn transport(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            reason: reason.into(),
        }
    }

    /// Check if this is a validation error raised before any side effect.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::SessionBusy | Self::InvalidDocumentType { .. } | Self::InsufficientDocuments { .. }
        )
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. } => 2,
            Self::Io { .. } | Self::FailedToWrite { .. } => 5,
            Self::Transport { .. } | Self::MessageNotFound => 6,
            _ => 1,
        }
    }
}
