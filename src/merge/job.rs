use std::path::PathBuf;

use crate::error::Result;
use crate::io::{DocumentHandle, DocumentStore, remove_if_exists};
use crate::merge::{MergeOutcome, Merger};
use crate::session::UserId;

/// One execution of the merge pipeline against a snapshot of a queue.
///
/// The job owns its output and trailer files: both are removed when the job
/// is dropped, whether the merge succeeded, failed or was never run. Input
/// files belong to the session queue and are left alone.
#[derive(Debug)]
pub struct MergeJob {
    /// Queued documents at the time the merge was requested, in order.
    pub inputs: Vec<DocumentHandle>,
    /// File name the output is delivered under.
    pub output_name: String,
    /// Where the merged document is written.
    pub output_path: PathBuf,
    /// Where the trailer page is rendered.
    pub trailer_path: PathBuf,
}

impl MergeJob {
    pub fn new(
        store: &DocumentStore,
        user: UserId,
        inputs: Vec<DocumentHandle>,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            inputs,
            output_name: output_name.into(),
            output_path: store.output_path(user),
            trailer_path: store.trailer_path(user),
        }
    }

    /// Paths of the input documents, in queue order.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.inputs.iter().map(|h| h.path.clone()).collect()
    }

    /// Run the merge synchronously. Meant to be called from a worker.
    pub fn run(&self, merger: &Merger) -> Result<MergeOutcome> {
        merger.merge(&self.input_paths(), &self.output_path, &self.trailer_path)
    }
}

impl Drop for MergeJob {
    fn drop(&mut self) {
        remove_if_exists(&self.output_path);
        remove_if_exists(&self.trailer_path);
    }
}
