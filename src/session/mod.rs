//! Per-user session state.
//!
//! A [`Session`] holds the status of one user's conversation and the queue of
//! documents waiting to be merged. Sessions live in a [`SessionStore`] and are
//! created on first use. The store never holds its lock across an `.await`:
//! every transition is a short synchronous closure run through
//! [`SessionStore::with_session`].
//!
//! Transitions that return the session to [`SessionStatus::Idle`] hand the
//! drained queue back to the caller, which is responsible for releasing the
//! files behind it.
//!
//! A document takes its place in the queue when it is admitted, before its
//! download starts. Downloads of one user may finish in any order; the queue
//! still follows the order the documents arrived in.

pub mod manager;
mod reply;

pub use manager::{Outcome, SessionManager};
pub use reply::Reply;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::{MergeBotError, Result};
use crate::io::DocumentHandle;

/// Identity of a user as supplied by the transport.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a session is in the merge workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Accepting documents and commands.
    #[default]
    Idle,
    /// `/merge` was accepted; the next text message names the output.
    WaitingName,
    /// A merge job owns the queue.
    Merging,
}

/// Place reserved in the queue for an admitted document.
///
/// Documents are queued in admission order, whatever order their downloads
/// finish in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Admission(u64);

/// One user's status and document queue.
#[derive(Debug, Clone, Default)]
pub struct Session {
    status: SessionStatus,
    queue: Vec<DocumentHandle>,
    /// Admission of each queued document, parallel to `queue`.
    positions: Vec<Admission>,
    /// Admitted documents whose download has not resolved yet.
    pending: BTreeSet<Admission>,
    next_admission: u64,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Queued documents in arrival order.
    pub fn queue(&self) -> &[DocumentHandle] {
        &self.queue
    }

    /// Number of admitted documents still downloading.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Reserve a queue position for a document about to be downloaded.
    ///
    /// Only an idle session admits documents. The returned [`Admission`] must
    /// be resolved with [`push_document`](Self::push_document) or
    /// [`abandon`](Self::abandon).
    pub fn admit_document(&mut self) -> Result<Admission> {
        match self.status {
            SessionStatus::Idle => {
                let admission = Admission(self.next_admission);
                self.next_admission += 1;
                self.pending.insert(admission);
                Ok(admission)
            }
            SessionStatus::WaitingName | SessionStatus::Merging => Err(MergeBotError::SessionBusy),
        }
    }

    /// Put a downloaded document into the position reserved for it.
    ///
    /// The document is refused, and handed back, if the session was reset
    /// since it was admitted. Returns the number of queued documents.
    pub fn push_document(
        &mut self,
        handle: DocumentHandle,
        admission: Admission,
    ) -> std::result::Result<usize, DocumentHandle> {
        if !self.pending.remove(&admission) {
            return Err(handle);
        }
        let at = self.positions.partition_point(|p| *p < admission);
        self.positions.insert(at, admission);
        self.queue.insert(at, handle);
        Ok(self.queue.len())
    }

    /// Give up a reserved position after a failed download.
    pub fn abandon(&mut self, admission: Admission) -> bool {
        self.pending.remove(&admission)
    }

    /// Handle `/merge`: move to [`SessionStatus::WaitingName`].
    ///
    /// Documents still downloading count towards `min_documents`. Repeating
    /// `/merge` while already waiting for a name is accepted.
    pub fn begin_naming(&mut self, min_documents: usize) -> Result<()> {
        if self.status == SessionStatus::Merging {
            return Err(MergeBotError::SessionBusy);
        }
        let queued = self.queue.len() + self.pending.len();
        if queued < min_documents {
            return Err(MergeBotError::InsufficientDocuments {
                queued,
                required: min_documents,
            });
        }
        self.status = SessionStatus::WaitingName;
        Ok(())
    }

    /// Handle the output name: move to [`SessionStatus::Merging`].
    ///
    /// Returns `false`, leaving the session alone, if no name was expected.
    pub fn begin_merge(&mut self) -> bool {
        if self.status != SessionStatus::WaitingName {
            return false;
        }
        self.status = SessionStatus::Merging;
        true
    }

    /// Snapshot of the queue for a merge, taken once no download is pending.
    ///
    /// If failed downloads left fewer than `min_documents` queued, the
    /// session goes back to idle with its queue intact.
    pub fn merge_inputs(&mut self, min_documents: usize) -> Result<Vec<DocumentHandle>> {
        if self.status != SessionStatus::Merging {
            return Err(MergeBotError::SessionBusy);
        }
        if self.queue.len() < min_documents {
            self.status = SessionStatus::Idle;
            return Err(MergeBotError::InsufficientDocuments {
                queued: self.queue.len(),
                required: min_documents,
            });
        }
        Ok(self.queue.clone())
    }

    /// Handle `/cancel`. Refused while merging.
    pub fn cancel(&mut self) -> Result<Vec<DocumentHandle>> {
        if self.status == SessionStatus::Merging {
            return Err(MergeBotError::SessionBusy);
        }
        Ok(self.reset())
    }

    /// Handle `/start`. Refused while merging.
    pub fn restart(&mut self) -> Result<Vec<DocumentHandle>> {
        if self.status == SessionStatus::Merging {
            return Err(MergeBotError::SessionBusy);
        }
        Ok(self.reset())
    }

    /// Resolve a merge, successful or not. No-op unless merging.
    pub fn finish_merge(&mut self) -> Vec<DocumentHandle> {
        if self.status != SessionStatus::Merging {
            return Vec::new();
        }
        self.reset()
    }

    fn reset(&mut self) -> Vec<DocumentHandle> {
        self.status = SessionStatus::Idle;
        self.positions.clear();
        self.pending.clear();
        std::mem::take(&mut self.queue)
    }
}

/// All sessions of the process, keyed by user.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
    /// Signalled whenever a pending admission resolves.
    settled: Notify,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on `user`'s session, creating it first if needed.
    pub fn with_session<R>(&self, user: UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let (result, resolved) = {
            let mut sessions = self.lock();
            let session = sessions.entry(user).or_default();
            let pending = session.pending();
            let result = f(session);
            (result, session.pending() < pending)
        };
        if resolved {
            self.settled.notify_waiters();
        }
        result
    }

    /// Wait until none of `user`'s admitted documents is still downloading.
    pub async fn wait_settled(&self, user: UserId) {
        loop {
            let mut notified = pin!(self.settled.notified());
            notified.as_mut().enable();
            if self.with_session(user, |s| s.pending() == 0) {
                return;
            }
            notified.await;
        }
    }

    /// Copy of `user`'s session, if one exists.
    pub fn get(&self, user: UserId) -> Option<Session> {
        self.lock().get(&user).cloned()
    }

    /// Status of `user`'s session. Unknown users are idle.
    pub fn status(&self, user: UserId) -> SessionStatus {
        self.lock()
            .get(&user)
            .map(Session::status)
            .unwrap_or_default()
    }

    /// Drop `user`'s session, returning it.
    pub fn remove(&self, user: UserId) -> Option<Session> {
        self.lock().remove(&user)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
