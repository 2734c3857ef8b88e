//! Line-delimited JSON transport.
//!
//! Inbound messages are read as one JSON object per line. Everything the bot
//! sends is written as one [`OutboundEvent`] per line. Remote files are local
//! paths: downloading copies the file into the storage area and sending a
//! document copies it into the outbox directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::error::{MergeBotError, Result};
use crate::session::UserId;
use crate::transport::{InboundMessage, MessageRef, ProgressSink, RemoteFile, Transport};

/// Size of the chunks files are copied in. Progress is reported per chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// One line written by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
    Sent {
        chat: UserId,
        message_id: u64,
        text: String,
    },
    Edited {
        chat: UserId,
        message_id: u64,
        text: String,
    },
    Deleted {
        chat: UserId,
        message_id: u64,
    },
    Document {
        chat: UserId,
        file_name: String,
        path: PathBuf,
        caption: String,
        size: u64,
    },
}

/// Transport over a pair of byte streams.
pub struct JsonLinesTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<W>,
    outbox: PathBuf,
    next_id: AtomicU64,
    live: StdMutex<HashSet<MessageRef>>,
}

impl JsonLinesTransport<tokio::io::Stdin, tokio::io::Stdout> {
    /// Transport over the process's stdin and stdout.
    pub fn stdio(outbox: impl Into<PathBuf>) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), outbox)
    }
}

impl<R, W> JsonLinesTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, outbox: impl Into<PathBuf>) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            outbox: outbox.into(),
            next_id: AtomicU64::new(1),
            live: StdMutex::new(HashSet::new()),
        }
    }

    /// Consume the transport, returning the output stream.
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    async fn emit(&self, event: &OutboundEvent) -> Result<()> {
        let json = serde_json::to_string(event)
            .map_err(|e| MergeBotError::transport("encode", e.to_string()))?;

        let mut writer = self.writer.lock().await;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    fn live(&self) -> std::sync::MutexGuard<'_, HashSet<MessageRef>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Copy `src` to `dest` in chunks, reporting progress after each one.
async fn copy_with_progress(
    src: &Path,
    dest: &Path,
    progress: &dyn ProgressSink,
) -> std::io::Result<u64> {
    let mut input = tokio::fs::File::open(src).await?;
    let total = input.metadata().await?.len();
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut output = tokio::fs::File::create(dest).await?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut current = 0u64;
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n]).await?;
        current += n as u64;
        progress.report(current, total).await;
    }
    output.flush().await?;

    Ok(current)
}

#[async_trait]
impl<R, W> Transport for JsonLinesTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&self) -> Result<Option<InboundMessage>> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundMessage>(trimmed) {
                Ok(message) => return Ok(Some(message)),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed inbound line");
                }
            }
        }
    }

    async fn download(
        &self,
        file: &RemoteFile,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        copy_with_progress(Path::new(&file.source), dest, progress)
            .await
            .map_err(|e| MergeBotError::transport("download", e.to_string()))
    }

    async fn send_text(&self, chat: UserId, text: &str) -> Result<MessageRef> {
        let message = MessageRef {
            chat,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        self.emit(&OutboundEvent::Sent {
            chat,
            message_id: message.id,
            text: text.to_string(),
        })
        .await?;

        self.live().insert(message);
        Ok(message)
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()> {
        if !self.live().contains(&message) {
            return Err(MergeBotError::MessageNotFound);
        }
        self.emit(&OutboundEvent::Edited {
            chat: message.chat,
            message_id: message.id,
            text: text.to_string(),
        })
        .await
    }

    async fn send_document(
        &self,
        chat: UserId,
        path: &Path,
        display_name: &str,
        caption: &str,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let delivered = self.outbox.join(display_name);
        let size = copy_with_progress(path, &delivered, progress)
            .await
            .map_err(|e| MergeBotError::transport("send_document", e.to_string()))?;

        self.emit(&OutboundEvent::Document {
            chat,
            file_name: display_name.to_string(),
            path: delivered,
            caption: caption.to_string(),
            size,
        })
        .await
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        if !self.live().remove(&message) {
            return Err(MergeBotError::MessageNotFound);
        }
        self.emit(&OutboundEvent::Deleted {
            chat: message.chat,
            message_id: message.id,
        })
        .await
    }
}
