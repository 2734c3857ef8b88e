//! Shared helpers for the integration tests.
//!
//! [`RecordingTransport`] stands in for a chat carrier: inbound messages are
//! built directly in the tests and everything the bot sends is recorded.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use lopdf::{Document, Object, Stream, dictionary};

use pdfmerge::io::PdfWriter;
use pdfmerge::transport::{MessageBody, MessageRef, ProgressSink, RemoteFile, Sender};
use pdfmerge::{
    Config, DocumentStore, InboundMessage, MergeBotError, Result, SessionManager, Transport, UserId,
};

/// Something the bot did through the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Sent { message: MessageRef, text: String },
    Edited { message: MessageRef, text: String },
    Deleted { message: MessageRef },
    Document { chat: UserId, name: String, pages: usize, caption: String },
}

/// Transport that records every outbound call.
///
/// Downloads copy a local file named by [`RemoteFile::source`].
#[derive(Debug, Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<Recorded>>,
    next_id: AtomicU64,
    fail_edits: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent edit fail with `MessageNotFound`.
    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn edits(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Edited { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Every text shown to the user, sent or edited, in order.
    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Sent { text, .. } | Recorded::Edited { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<(String, usize, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Document {
                    name,
                    pages,
                    caption,
                    ..
                } => Some((name, pages, caption)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn recv(&self) -> Result<Option<InboundMessage>> {
        Ok(None)
    }

    async fn download(
        &self,
        file: &RemoteFile,
        dest: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        let written = tokio::fs::copy(&file.source, dest)
            .await
            .map_err(|e| MergeBotError::transport("download", e.to_string()))?;
        progress.report(written, written).await;
        Ok(written)
    }

    async fn send_text(&self, chat: UserId, text: &str) -> Result<MessageRef> {
        let message = MessageRef {
            chat,
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.record(Recorded::Sent {
            message,
            text: text.to_string(),
        });
        Ok(message)
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(MergeBotError::MessageNotFound);
        }
        self.record(Recorded::Edited {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat: UserId,
        path: &Path,
        display_name: &str,
        caption: &str,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let doc = Document::load(path).map_err(|e| MergeBotError::transport("send_document", e.to_string()))?;
        let size = std::fs::metadata(path)?.len();
        progress.report(size, size).await;

        self.record(Recorded::Document {
            chat,
            name: display_name.to_string(),
            pages: doc.get_pages().len(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        self.record(Recorded::Deleted { message });
        Ok(())
    }
}

/// A manager over a fresh storage area inside `dir`.
pub async fn manager(dir: &Path, transport: Arc<RecordingTransport>) -> SessionManager {
    let config = Config::with_work_dir(dir.join("work"));
    let store = DocumentStore::prepare(&config.work_dir)
        .await
        .expect("Failed to prepare storage area");
    SessionManager::new(&config, store, transport)
}

/// Write a PDF with `pages` empty US Letter pages.
pub fn create_test_pdf(path: &Path, pages: u32) -> PathBuf {
    create_sized_pdf(path, pages, 612, 792, 0)
}

/// Write a PDF with `pages` pages of `width` x `height`.
///
/// Each page's content stream carries about `padding` bytes of PDF comments,
/// which makes the file large without changing how it renders.
pub fn create_sized_pdf(path: &Path, pages: u32, width: i64, height: i64, padding: usize) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = b"% filler\n".repeat(padding / 9);

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.clone()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(kids),
            "Count" => Object::Integer(pages as i64),
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), width.into(), height.into()]),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    PdfWriter::write(&mut doc, path).expect("Failed to write test PDF");
    path.to_path_buf()
}

pub fn sender(user: i64) -> Sender {
    Sender {
        id: UserId(user),
        first_name: Some("Ada".to_string()),
    }
}

pub fn text(user: i64, message_id: u64, text: &str) -> InboundMessage {
    InboundMessage {
        sender: sender(user),
        message_id,
        body: MessageBody::Text {
            text: text.to_string(),
        },
    }
}

/// A document message pointing at a local file.
pub fn document(user: i64, message_id: u64, source: &Path, name: &str) -> InboundMessage {
    let file_size = std::fs::metadata(source).map(|m| m.len()).unwrap_or(0);
    InboundMessage {
        sender: sender(user),
        message_id,
        body: MessageBody::Document {
            file: RemoteFile {
                source: source.to_string_lossy().into_owned(),
                file_name: Some(name.to_string()),
                file_size,
                mime_type: Some("application/pdf".to_string()),
            },
        },
    }
}
