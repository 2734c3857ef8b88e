//! Throttled transfer progress reporting.
//!
//! Progress is shown by editing the status message of a transfer. Edits are
//! rate limited per status message: after a successful edit, further reports
//! are dropped until the interval has passed, and a report whose text matches
//! the last one shown is dropped as well. Nothing forces a final 100% edit,
//! so the last report of a fast transfer may never be shown.
//!
//! Edits are best effort. A failed edit is logged and otherwise ignored.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::output::MessageFormatter;
use crate::output::formatter::BAR_SEGMENTS;
use crate::transport::{MessageRef, ProgressSink, Transport};

/// Direction of a transfer, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferLabel {
    Downloading,
    Uploading,
}

impl fmt::Display for TransferLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferLabel::Downloading => f.write_str("Downloading"),
            TransferLabel::Uploading => f.write_str("Uploading"),
        }
    }
}

/// A computed progress sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub label: TransferLabel,
    /// Bytes transferred so far.
    pub current: u64,
    /// Total bytes of the transfer.
    pub total: u64,
    /// Completion in percent.
    pub percent: f64,
    /// Number of filled bar segments.
    pub filled: usize,
}

impl ProgressUpdate {
    /// Compute a sample, or `None` if the total size is unknown (zero).
    pub fn new(label: TransferLabel, current: u64, total: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }

        let percent = current as f64 * 100.0 / total as f64;
        let filled = ((percent / 10.0) as usize).min(BAR_SEGMENTS);

        Some(Self {
            label,
            current,
            total,
            percent,
            filled,
        })
    }
}

#[derive(Debug)]
struct ProgressState {
    last_update: Instant,
    last_text: String,
}

/// Rate-limited progress editor shared by all transfers.
pub struct ProgressNotifier {
    transport: Arc<dyn Transport>,
    formatter: MessageFormatter,
    interval: Duration,
    state: Mutex<HashMap<MessageRef, ProgressState>>,
}

impl ProgressNotifier {
    pub fn new(transport: Arc<dyn Transport>, formatter: MessageFormatter, interval: Duration) -> Self {
        Self {
            transport,
            formatter,
            interval,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Report progress of the transfer shown in `message`.
    ///
    /// Returns whether an edit was sent and accepted.
    pub async fn report(
        &self,
        message: MessageRef,
        label: TransferLabel,
        current: u64,
        total: u64,
    ) -> bool {
        let Some(update) = ProgressUpdate::new(label, current, total) else {
            return false;
        };
        let text = self.formatter.progress(&update);
        let now = Instant::now();

        let suppressed = self.lock().get(&message).is_some_and(|previous| {
            now.duration_since(previous.last_update) < self.interval || previous.last_text == text
        });
        if suppressed {
            return false;
        }

        match self.transport.edit_text(message, &text).await {
            Ok(()) => {
                self.lock().insert(
                    message,
                    ProgressState {
                        last_update: now,
                        last_text: text,
                    },
                );
                true
            }
            Err(err) => {
                tracing::debug!(user = %message.chat, error = %err, "progress edit dropped");
                false
            }
        }
    }

    /// Forget the throttle state of a finished transfer.
    pub fn finish(&self, message: MessageRef) {
        self.lock().remove(&message);
    }

    /// Number of transfers currently tracked.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// A [`ProgressSink`] reporting into `message`.
    pub fn hook(self: &Arc<Self>, message: MessageRef, label: TransferLabel) -> ProgressHook {
        ProgressHook {
            notifier: Arc::clone(self),
            message,
            label,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MessageRef, ProgressState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Progress callback bound to one transfer's status message.
pub struct ProgressHook {
    notifier: Arc<ProgressNotifier>,
    message: MessageRef,
    label: TransferLabel,
}

#[async_trait]
impl ProgressSink for ProgressHook {
    async fn report(&self, current: u64, total: u64) {
        self.notifier
            .report(self.message, self.label, current, total)
            .await;
    }
}
