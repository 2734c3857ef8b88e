//! Message model and the transport boundary.
//!
//! The chat protocol itself is not part of this crate. The session manager
//! talks to whatever carries messages through the [`Transport`] trait, and
//! inbound events arrive as [`InboundMessage`] values.

pub mod jsonl;

pub use jsonl::JsonLinesTransport;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::UserId;

/// MIME type accepted for queued documents.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Reference to a message previously sent by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Conversation the message lives in.
    pub chat: UserId,
    /// Transport-assigned message id.
    pub id: u64,
}

/// Author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// A file attached to an inbound message, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Transport-specific locator used by [`Transport::download`].
    pub source: String,
    /// Name the sender gave the file.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Declared size in bytes.
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl RemoteFile {
    /// Name to show for the file, falling back to a generic one.
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("document.pdf")
    }

    /// Whether the file looks like a PDF document.
    ///
    /// The declared name must end in `.pdf`. A declared MIME type, if any,
    /// must be `application/pdf`.
    pub fn is_pdf(&self) -> bool {
        let named_pdf = self
            .file_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().ends_with(".pdf"));
        let typed_pdf = self
            .mime_type
            .as_deref()
            .is_none_or(|mime| mime.eq_ignore_ascii_case(PDF_MIME_TYPE));

        named_pdf && typed_pdf
    }
}

/// Content of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text, including commands.
    Text { text: String },
    /// A file sent as a document.
    Document { file: RemoteFile },
    /// Photos, videos and other non-document media.
    Media { kind: String },
}

/// One event received from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: Sender,
    pub message_id: u64,
    pub body: MessageBody,
}

/// Bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset the session and greet the user.
    Start,
    /// Ask for an output name and merge the queue.
    Merge,
    /// Drop the queue.
    Cancel,
}

impl Command {
    /// Parse a command from message text.
    ///
    /// Accepts `/name`, optionally addressed as `/name@bot` and followed by
    /// arguments, which are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _)| name);

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "merge" => Some(Self::Merge),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Receives byte-level transfer progress.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, current: u64, total: u64);
}

/// A sink that drops every report.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _current: u64, _total: u64) {}
}

/// Carrier for inbound and outbound messages.
///
/// Implementations must be usable from many tasks at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Next inbound message, or `None` once the stream has ended.
    async fn recv(&self) -> Result<Option<InboundMessage>>;

    /// Fetch `file` into `dest`, returning the number of bytes written.
    async fn download(
        &self,
        file: &RemoteFile,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64>;

    async fn send_text(&self, chat: UserId, text: &str) -> Result<MessageRef>;

    /// Replace the text of a sent message.
    ///
    /// Returns [`MergeBotError::MessageNotFound`](crate::MergeBotError::MessageNotFound)
    /// if the message no longer exists.
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()>;

    async fn send_document(
        &self,
        chat: UserId,
        path: &Path,
        display_name: &str,
        caption: &str,
        progress: &dyn ProgressSink,
    ) -> Result<()>;

    async fn delete_message(&self, message: MessageRef) -> Result<()>;
}
