//! The session state machine and its side effects.
//!
//! Each inbound message is handled by [`SessionManager::handle`]. Handlers run
//! their guard check and state transition synchronously before the first
//! `.await`, so two messages of the same user can never both pass a guard
//! that only one of them should.
//!
//! | From | Event | To |
//! |---|---|---|
//! | Idle | document | Idle (admitted, queued once downloaded) |
//! | WaitingName, Merging | document | unchanged, busy |
//! | Idle, WaitingName | `/merge` with enough documents | WaitingName |
//! | Idle | `/merge` with too few documents | Idle |
//! | WaitingName | text | Merging, once admitted downloads resolve |
//! | Merging | too few documents after downloads resolve | Idle |
//! | Merging | `/cancel`, `/start`, `/merge` | unchanged, busy |
//! | Idle, WaitingName | `/cancel`, `/start` | Idle, queue released |
//! | Merging | job resolved | Idle, queue and artifacts released |
//!
//! A document is admitted, and its queue position fixed, before its download
//! starts. `/merge` counts documents still downloading, and the merge itself
//! waits for them, so a burst of documents followed by `/merge` is merged in
//! the order it was sent.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{MergeBotError, Result};
use crate::io::{DocumentHandle, DocumentStore, remove_if_exists};
use crate::merge::{MergeJob, Merger};
use crate::output::{MessageFormatter, ProgressNotifier, TransferLabel};
use crate::session::{Admission, Reply, Session, SessionStore, UserId};
use crate::transport::{Command, InboundMessage, MessageBody, MessageRef, RemoteFile, Sender, Transport};
use crate::utils::{clean_filename, format_file_size, sanitize_display_name};
use crate::worker::WorkerPool;

/// What handling a message achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `/start` reset the session.
    Welcomed { released: usize },
    /// A document was appended to the queue.
    DocumentQueued { queue_len: usize },
    /// `/merge` was accepted and the output name was requested.
    AwaitingName,
    /// A merged document was delivered.
    Merged {
        output_name: String,
        files: usize,
        pages: usize,
    },
    /// `/cancel` cleared the queue.
    Cancelled { released: usize },
    /// The message needed no action.
    Ignored,
}

/// Routes inbound messages through the session state machine.
pub struct SessionManager {
    sessions: Arc<SessionStore>,
    store: DocumentStore,
    pool: WorkerPool,
    merger: Arc<Merger>,
    transport: Arc<dyn Transport>,
    progress: Arc<ProgressNotifier>,
    formatter: MessageFormatter,
    min_documents: usize,
    download_timeout: Option<Duration>,
}

impl SessionManager {
    /// Build a manager over a prepared document store.
    pub fn new(config: &Config, store: DocumentStore, transport: Arc<dyn Transport>) -> Self {
        let formatter = MessageFormatter::new();
        let progress = Arc::new(ProgressNotifier::new(
            Arc::clone(&transport),
            formatter.clone(),
            config.progress_interval,
        ));

        Self {
            sessions: Arc::new(SessionStore::new()),
            store,
            pool: WorkerPool::new(config.workers),
            merger: Arc::new(Merger::default()),
            transport,
            progress,
            formatter,
            min_documents: config.min_documents,
            download_timeout: config.download_timeout,
        }
    }

    /// Replace the merge engine, e.g. to customise the trailer page.
    pub fn with_merger(mut self, merger: Merger) -> Self {
        self.merger = Arc::new(merger);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn progress(&self) -> &ProgressNotifier {
        &self.progress
    }

    /// Handle one inbound message.
    ///
    /// Every error has already been reported to the user when this returns.
    ///
    /// # Errors
    ///
    /// Returns the validation, download, merge or transport error that ended
    /// the handling of the message.
    pub async fn handle(&self, message: InboundMessage) -> Result<Outcome> {
        let InboundMessage {
            sender,
            message_id,
            body,
        } = message;

        match body {
            MessageBody::Text { text } => match Command::parse(&text) {
                Some(Command::Start) => self.handle_start(&sender).await,
                Some(Command::Merge) => self.handle_merge_command(sender.id).await,
                Some(Command::Cancel) => self.handle_cancel(sender.id).await,
                None => self.handle_name(&sender, &text).await,
            },
            MessageBody::Document { file } => self.handle_document(sender.id, message_id, &file).await,
            MessageBody::Media { kind } => {
                self.reply(sender.id, &Reply::InvalidDocument).await?;
                Err(MergeBotError::invalid_document_type(kind))
            }
        }
    }

    async fn handle_start(&self, sender: &Sender) -> Result<Outcome> {
        let user = sender.id;
        let queue = match self.sessions.with_session(user, Session::restart) {
            Ok(queue) => queue,
            Err(err) => {
                self.reply(user, &Reply::Busy).await?;
                return Err(err);
            }
        };
        let released = self.store.release(&queue);

        let name = sanitize_display_name(sender.first_name.as_deref());
        tracing::info!(user = %user, name = %name, "new user");

        self.reply(user, &Reply::Welcome { name }).await?;
        Ok(Outcome::Welcomed { released })
    }

    async fn handle_cancel(&self, user: UserId) -> Result<Outcome> {
        let queue = match self.sessions.with_session(user, Session::cancel) {
            Ok(queue) => queue,
            Err(err) => {
                self.reply(user, &Reply::MergeLocked).await?;
                return Err(err);
            }
        };
        let released = self.store.release(&queue);
        tracing::debug!(user = %user, files = queue.len(), released, "queue cancelled");

        let reply = if queue.is_empty() {
            Reply::NothingToCancel
        } else {
            Reply::QueueCleared
        };
        self.reply(user, &reply).await?;

        Ok(Outcome::Cancelled {
            released: queue.len(),
        })
    }

    async fn handle_merge_command(&self, user: UserId) -> Result<Outcome> {
        let min_documents = self.min_documents;
        match self
            .sessions
            .with_session(user, |s| s.begin_naming(min_documents))
        {
            Ok(()) => {
                self.reply(user, &Reply::AskForName).await?;
                Ok(Outcome::AwaitingName)
            }
            Err(err) => {
                let reply = match &err {
                    MergeBotError::InsufficientDocuments { required, .. } => {
                        Reply::NeedMoreDocuments {
                            required: *required,
                        }
                    }
                    _ => Reply::Busy,
                };
                self.reply(user, &reply).await?;
                Err(err)
            }
        }
    }

    async fn handle_document(&self, user: UserId, message_id: u64, file: &RemoteFile) -> Result<Outcome> {
        let pending = match self.sessions.with_session(user, Session::admit_document) {
            Ok(admission) => PendingDocument {
                sessions: Arc::clone(&self.sessions),
                user,
                admission,
                settled: false,
            },
            Err(err) => {
                self.reply(user, &Reply::Busy).await?;
                return Err(err);
            }
        };

        if !file.is_pdf() {
            self.reply(user, &Reply::InvalidDocument).await?;
            return Err(MergeBotError::invalid_document_type(file.display_name()));
        }

        let status = self.reply(user, &Reply::DownloadStarting).await?;
        let dest = self.store.reserve(user, message_id);

        let downloaded = self.download(status, file, &dest).await;
        self.progress.finish(status);

        if let Err(err) = downloaded {
            remove_if_exists(&dest);
            tracing::error!(user = %user, error = %err, "download failed");
            self.update_status(status, &Reply::DownloadError {
                reason: err.to_string(),
            })
            .await;
            return Err(err);
        }

        let handle = match self
            .store
            .commit(dest, file.display_name(), file.file_size)
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(user = %user, file = file.display_name(), "download was empty");
                self.update_status(status, &Reply::DownloadFailed).await;
                return Err(err);
            }
        };

        match pending.commit(handle) {
            Ok(queue_len) => {
                tracing::info!(
                    user = %user,
                    file = file.display_name(),
                    size = %format_file_size(file.file_size),
                    queue_len,
                    "file received"
                );
                self.update_status(status, &Reply::DocumentQueued {
                    name: file.display_name().to_string(),
                    size_bytes: file.file_size,
                    queue_len,
                })
                .await;
                Ok(Outcome::DocumentQueued { queue_len })
            }
            Err(stale) => {
                self.store.release([&stale]);
                tracing::debug!(user = %user, file = file.display_name(), "session changed during download");
                self.update_status(status, &Reply::Busy).await;
                Err(MergeBotError::SessionBusy)
            }
        }
    }

    async fn download(&self, status: MessageRef, file: &RemoteFile, dest: &std::path::Path) -> Result<u64> {
        let hook = self.progress.hook(status, TransferLabel::Downloading);
        let download = self.transport.download(file, dest, &hook);

        match self.download_timeout {
            Some(limit) => tokio::time::timeout(limit, download)
                .await
                .unwrap_or_else(|_| Err(MergeBotError::transport("download", "timed out"))),
            None => download.await,
        }
    }

    async fn handle_name(&self, sender: &Sender, text: &str) -> Result<Outcome> {
        let user = sender.id;
        if !self.sessions.with_session(user, Session::begin_merge) {
            return Ok(Outcome::Ignored);
        }

        // From here on the session is Merging. Unless too few documents
        // survive their downloads, the guard returns it to Idle and releases
        // the queue however this function exits.
        let _merging = MergingGuard {
            sessions: Arc::clone(&self.sessions),
            store: self.store.clone(),
            user,
        };

        self.sessions.wait_settled(user).await;
        let min_documents = self.min_documents;
        let inputs = match self
            .sessions
            .with_session(user, |s| s.merge_inputs(min_documents))
        {
            Ok(inputs) => inputs,
            Err(err) => {
                if let MergeBotError::InsufficientDocuments { required, .. } = &err {
                    self.reply(user, &Reply::NeedMoreDocuments {
                        required: *required,
                    })
                    .await?;
                }
                return Err(err);
            }
        };

        let output_name = clean_filename(text);
        tracing::info!(user = %user, files = inputs.len(), output = %output_name, "merge started");

        let job = Arc::new(MergeJob::new(&self.store, user, inputs, output_name));
        let result = self.run_merge(sender, &job).await;

        if let Err(err) = &result {
            tracing::error!(user = %user, error = %err, "merge failed");
        }
        result
    }

    async fn run_merge(&self, sender: &Sender, job: &Arc<MergeJob>) -> Result<Outcome> {
        let user = sender.id;
        let status = self
            .reply(user, &Reply::Processing {
                output_name: job.output_name.clone(),
            })
            .await?;

        let worker_job = Arc::clone(job);
        let merger = Arc::clone(&self.merger);
        let merged = self.pool.run(move || worker_job.run(&merger)).await;

        let outcome = match merged {
            Ok(outcome) => outcome,
            Err(err) => {
                self.update_status(status, &Reply::MergeFailed {
                    reason: err.to_string(),
                })
                .await;
                return Err(err);
            }
        };

        self.update_status(status, &Reply::Uploading).await;

        let caption = self.formatter.render(&Reply::Caption {
            output_name: job.output_name.clone(),
            files: job.inputs.len(),
            requester: sanitize_display_name(sender.first_name.as_deref()),
        });
        let hook = self.progress.hook(status, TransferLabel::Uploading);
        let sent = self
            .transport
            .send_document(user, &job.output_path, &job.output_name, &caption, &hook)
            .await;
        self.progress.finish(status);

        if let Err(err) = sent {
            self.update_status(status, &Reply::MergeFailed {
                reason: err.to_string(),
            })
            .await;
            return Err(err);
        }

        tracing::info!(user = %user, output = %job.output_name, pages = outcome.total_pages, "upload complete");

        if let Err(err) = self.transport.delete_message(status).await {
            tracing::debug!(user = %user, error = %err, "status message not deleted");
        }

        Ok(Outcome::Merged {
            output_name: job.output_name.clone(),
            files: outcome.files_merged,
            pages: outcome.total_pages,
        })
    }

    async fn reply(&self, user: UserId, reply: &Reply) -> Result<MessageRef> {
        self.transport
            .send_text(user, &self.formatter.render(reply))
            .await
    }

    /// Edit `status` to show `reply`, sending a new message if the edit fails.
    async fn update_status(&self, status: MessageRef, reply: &Reply) {
        let text = self.formatter.render(reply);
        if self.transport.edit_text(status, &text).await.is_ok() {
            return;
        }
        if let Err(err) = self.transport.send_text(status.chat, &text).await {
            tracing::warn!(user = %status.chat, error = %err, "status update lost");
        }
    }
}

/// Returns a merging session to idle when dropped.
struct MergingGuard {
    sessions: Arc<SessionStore>,
    store: DocumentStore,
    user: UserId,
}

impl Drop for MergingGuard {
    fn drop(&mut self) {
        let queue = self.sessions.with_session(self.user, Session::finish_merge);
        let released = self.store.release(&queue);
        tracing::debug!(user = %self.user, released, "merge resolved");
    }
}

/// An admitted document whose download has not resolved yet.
///
/// Dropping it without [`commit`](Self::commit) gives up the queue position.
struct PendingDocument {
    sessions: Arc<SessionStore>,
    user: UserId,
    admission: Admission,
    settled: bool,
}

impl PendingDocument {
    /// Queue `handle` in the admitted position. Hands it back if the session
    /// was reset meanwhile.
    fn commit(mut self, handle: DocumentHandle) -> std::result::Result<usize, DocumentHandle> {
        self.settled = true;
        let admission = self.admission;
        self.sessions
            .with_session(self.user, |s| s.push_document(handle, admission))
    }
}

impl Drop for PendingDocument {
    fn drop(&mut self) {
        if !self.settled {
            let admission = self.admission;
            self.sessions.with_session(self.user, |s| s.abandon(admission));
        }
    }
}
