//! Event loop feeding inbound messages to the session manager.
//!
//! Every message is handled in its own task, spawned in arrival order. A
//! failing or panicking handler only affects the message it was handling.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::{JoinError, JoinSet};

use crate::error::Result;
use crate::session::SessionManager;
use crate::transport::{InboundMessage, Transport};

/// How a single message ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handled {
    Ok,
    Rejected,
    Failed,
    Panicked,
}

/// Counters for one run of the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages read from the transport.
    pub received: usize,
    /// Messages handled successfully.
    pub handled: usize,
    /// Requests refused by a session guard or type check.
    pub rejected: usize,
    /// Handlers that ended in a download, merge or transport error.
    pub failed: usize,
    /// Handlers that panicked.
    pub panicked: usize,
}

impl DispatchStats {
    fn record(&mut self, joined: std::result::Result<Handled, JoinError>) {
        match joined {
            Ok(Handled::Ok) => self.handled += 1,
            Ok(Handled::Rejected) => self.rejected += 1,
            Ok(Handled::Failed) => self.failed += 1,
            Ok(Handled::Panicked) => self.panicked += 1,
            Err(err) => {
                tracing::error!(error = %err, "message task aborted");
                self.panicked += 1;
            }
        }
    }
}

/// Reads messages from a transport and dispatches them.
pub struct Dispatcher {
    manager: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(manager: Arc<SessionManager>, transport: Arc<dyn Transport>) -> Self {
        Self { manager, transport }
    }

    /// Run until the transport's inbound stream ends, then wait for every
    /// message still being handled.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading from the transport fails.
    pub async fn run(&self) -> Result<DispatchStats> {
        let mut tasks = JoinSet::new();
        let mut stats = DispatchStats::default();

        while let Some(message) = self.transport.recv().await? {
            stats.received += 1;
            tasks.spawn(handle_isolated(Arc::clone(&self.manager), message));

            while let Some(joined) = tasks.try_join_next() {
                stats.record(joined);
            }
        }

        tracing::info!(in_flight = tasks.len(), "inbound stream closed");
        while let Some(joined) = tasks.join_next().await {
            stats.record(joined);
        }

        Ok(stats)
    }
}

async fn handle_isolated(manager: Arc<SessionManager>, message: InboundMessage) -> Handled {
    let user = message.sender.id;

    match AssertUnwindSafe(manager.handle(message)).catch_unwind().await {
        Ok(Ok(outcome)) => {
            tracing::debug!(user = %user, ?outcome, "message handled");
            Handled::Ok
        }
        Ok(Err(err)) if err.is_user_error() => {
            tracing::debug!(user = %user, error = %err, "request rejected");
            Handled::Rejected
        }
        Ok(Err(err)) => {
            tracing::warn!(user = %user, error = %err, "request failed");
            Handled::Failed
        }
        Err(_) => {
            tracing::error!(user = %user, "message handler panicked");
            Handled::Panicked
        }
    }
}
