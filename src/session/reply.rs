/// Structured message the session manager sends to a user.
///
/// Rendering to text is done by [`MessageFormatter`](crate::output::MessageFormatter).
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Greeting after `/start`.
    Welcome { name: String },
    /// Status message shown while a document is fetched.
    DownloadStarting,
    /// A document was stored and appended to the queue.
    DocumentQueued {
        name: String,
        size_bytes: u64,
        queue_len: usize,
    },
    /// The download produced an empty or missing file.
    DownloadFailed,
    /// The download failed for another reason.
    DownloadError { reason: String },
    /// Something other than a PDF document was sent.
    InvalidDocument,
    /// The session is naming or merging and cannot take the request.
    Busy,
    /// `/merge` with too few queued documents.
    NeedMoreDocuments { required: usize },
    /// Prompt for the output file name.
    AskForName,
    /// `/cancel` during a merge.
    MergeLocked,
    QueueCleared,
    NothingToCancel,
    /// Status message while the merge job runs.
    Processing { output_name: String },
    /// Status message while the result is uploaded.
    Uploading,
    /// Caption attached to the delivered document.
    Caption {
        output_name: String,
        files: usize,
        requester: String,
    },
    /// The merge or its delivery failed.
    MergeFailed { reason: String },
}
