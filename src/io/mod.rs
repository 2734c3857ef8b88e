//! I/O operations for pdfmerge.
//!
//! This module handles all file I/O:
//! - The per-process storage area for queued documents ([`DocumentStore`])
//! - Loading PDF documents and reading their page geometry ([`PdfReader`])
//! - Writing merged PDFs to disk ([`PdfWriter`])

pub mod reader;
pub mod store;
pub mod writer;

pub use reader::{PageGeometry, PdfReader};
pub use store::{DocumentHandle, DocumentStore};
pub use writer::PdfWriter;

use std::io::ErrorKind;
use std::path::Path;

/// Remove a file, treating an already-missing file as success.
///
/// Returns `true` if a file was actually removed. Other failures are logged
/// and swallowed: cleanup never aborts the caller.
pub fn remove_if_exists(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == ErrorKind::NotFound => false,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove file");
            false
        }
    }
}
