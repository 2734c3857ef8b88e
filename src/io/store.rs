//! Per-process storage area for transient documents.
//!
//! Every file the bot touches lives in a single working directory:
//!
//! - queued inputs: `{user}_{message}_{timestamp}.pdf`
//! - merge output: `OUT_{user}_{timestamp}.pdf`
//! - trailer page: `PROMO_{user}.pdf`
//!
//! Paths are disjoint per user by construction, so no locking is needed for
//! file access. The directory is wiped and recreated once at startup; nothing
//! from a previous run is resumed.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{MergeBotError, Result};
use crate::io::remove_if_exists;
use crate::session::UserId;

/// Extension of every stored document.
const EXTENSION: &str = "pdf";

/// A stored input document owned by a session queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    /// Location of the verified file in the storage area.
    pub path: PathBuf,
    /// Name the sender gave the document.
    pub display_name: String,
    /// Size declared by the transport, in bytes.
    pub declared_size: u64,
}

/// Manages the storage area for queued documents and merge artifacts.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Create a store over an existing directory without touching its contents.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Wipe and recreate the storage area, returning a store over it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the old directory cannot be removed or the new
    /// one cannot be created.
    pub async fn prepare(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {
                tracing::info!(dir = %root.display(), "wiped storage area from previous run");
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tokio::fs::create_dir_all(&root).await?;

        Ok(Self { root })
    }

    /// Root directory of the storage area.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Produce the storage path for an incoming document.
    ///
    /// Unique across sessions and repeated calls as long as the transport's
    /// message ids are unique per user.
    pub fn reserve(&self, user: UserId, source_id: u64) -> PathBuf {
        self.root
            .join(format!("{user}_{source_id}_{}.{EXTENSION}", unix_timestamp()))
    }

    /// Path for the merged output of `user`'s next job.
    pub fn output_path(&self, user: UserId) -> PathBuf {
        self.root
            .join(format!("OUT_{user}_{}.{EXTENSION}", unix_timestamp()))
    }

    /// Path for the generated trailer page of `user`'s next job.
    pub fn trailer_path(&self, user: UserId) -> PathBuf {
        self.root.join(format!("PROMO_{user}.{EXTENSION}"))
    }

    /// Verify a finished download and turn it into a [`DocumentHandle`].
    ///
    /// # Errors
    ///
    /// Returns [`MergeBotError::EmptyOrCorruptDownload`] if the file is missing
    /// or empty. A partial file is removed before returning.
    pub async fn commit(
        &self,
        path: PathBuf,
        display_name: impl Into<String>,
        declared_size: u64,
    ) -> Result<DocumentHandle> {
        let written = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);

        if !written {
            remove_if_exists(&path);
            return Err(MergeBotError::empty_download(path));
        }

        Ok(DocumentHandle {
            path,
            display_name: display_name.into(),
            declared_size,
        })
    }

    /// Delete the files behind `handles`.
    ///
    /// Missing files are ignored, so releasing the same handles twice is a
    /// no-op. Returns the number of files actually removed.
    pub fn release<'a, I>(&self, handles: I) -> usize
    where
        I: IntoIterator<Item = &'a DocumentHandle>,
    {
        handles
            .into_iter()
            .filter(|handle| remove_if_exists(&handle.path))
            .count()
    }

    /// Number of files currently in the storage area.
    pub fn file_count(&self) -> usize {
        std::fs::read_dir(&self.root)
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
