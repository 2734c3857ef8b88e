use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lopdf::Document;

use crate::error::{MergeBotError, Result};
use crate::io::remove_if_exists;

/// Suffix of the staging file a document is written to before it is moved
/// into place.
const STAGING_SUFFIX: &str = ".part";

/// Serializes PDF documents to files.
///
/// A document only ever appears at its destination complete: it is written
/// to a staging file next to the destination and renamed over it.
pub struct PdfWriter;

impl PdfWriter {
    /// Writes `doc` to `path`, creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`MergeBotError::FailedToWrite`] if the directories or the
    /// staging file cannot be created, serialization fails, or the staging
    /// file cannot be moved into place. The staging file is removed and
    /// `path` is left as it was.
    pub fn write<P: AsRef<Path>>(doc: &mut Document, path: P) -> Result<()> {
        let path = path.as_ref();
        let staging = staging_path(path);

        let written = Self::write_staged(doc, path, &staging);
        if written.is_err() {
            remove_if_exists(&staging);
        }
        written
    }

    fn write_staged(doc: &mut Document, path: &Path, staging: &Path) -> Result<()> {
        let failed = |at: &Path, source: std::io::Error| MergeBotError::FailedToWrite {
            path: at.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| failed(parent, e))?;
        }

        let file = std::fs::File::create(staging).map_err(|e| failed(staging, e))?;
        let mut writer = BufWriter::new(file);
        doc.save_to(&mut writer)
            .map_err(|e| failed(staging, std::io::Error::other(e)))?;
        writer.flush().map_err(|e| failed(staging, e))?;
        drop(writer);

        std::fs::rename(staging, path).map_err(|e| failed(path, e))?;
        tracing::trace!(file = %path.display(), "pdf written");
        Ok(())
    }
}

/// `out.pdf` is staged as `out.pdf.part` in the same directory.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}
