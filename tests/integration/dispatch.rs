//! End-to-end tests driving the dispatcher over the JSON-lines transport.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use lopdf::Document;
use pdfmerge::output::MessageFormatter;
use pdfmerge::transport::jsonl::OutboundEvent;
use pdfmerge::{
    Config, DispatchStats, Dispatcher, DocumentStore, InboundMessage, JsonLinesTransport, Reply,
    SessionManager, SessionStatus, Transport, UserId,
};
use tempfile::tempdir;
use tokio::io::AsyncWrite;

use crate::common::{create_sized_pdf, document, text};

const INBOUND: &str = r#"{"sender":{"id":1,"first_name":"Ada"},"message_id":1,"body":{"type":"text","text":"/start"}}

this line is not json
{"sender":{"id":2},"message_id":1,"body":{"type":"media","kind":"photo"}}
{"sender":{"id":3},"message_id":1,"body":{"type":"text","text":"just chatting"}}
{"sender":{"id":4},"message_id":1,"body":{"type":"text","text":"/merge"}}
"#;

async fn dispatch(input: &str) -> (DispatchStats, Vec<OutboundEvent>) {
    let dir = tempdir().unwrap();
    let (stats, events, _) = dispatch_in(dir.path(), input).await;
    (stats, events)
}

/// In-memory writer the test can read while the transport is still shared.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl AsyncWrite for SharedBuf {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Run the dispatcher over `input` with its storage area and outbox in `dir`.
async fn dispatch_in(
    dir: &Path,
    input: &str,
) -> (DispatchStats, Vec<OutboundEvent>, Arc<SessionManager>) {
    let config = Config::with_work_dir(dir.join("work"));
    let store = DocumentStore::prepare(&config.work_dir).await.unwrap();

    let output = SharedBuf::default();
    let transport = Arc::new(JsonLinesTransport::new(
        Cursor::new(input.as_bytes().to_vec()),
        output.clone(),
        dir.join("outbox"),
    ));
    let shared: Arc<dyn Transport> = transport.clone();
    let manager = Arc::new(SessionManager::new(&config, store, Arc::clone(&shared)));

    let dispatcher = Dispatcher::new(Arc::clone(&manager), shared);
    let stats = dispatcher.run().await.unwrap();
    drop(dispatcher);

    drop(transport);

    let writer = output.0.lock().unwrap().clone();
    let events = String::from_utf8(writer)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    (stats, events, manager)
}

/// One JSON line per message.
fn lines(messages: &[InboundMessage]) -> String {
    messages
        .iter()
        .map(|message| serde_json::to_string(message).unwrap() + "\n")
        .collect()
}

/// A large three page document followed by a small single page one.
///
/// The first file takes many more chunks to download than the second.
fn large_then_small(dir: &Path) -> (PathBuf, PathBuf) {
    let first = create_sized_pdf(&dir.join("first.pdf"), 3, 500, 500, 1_400_000);
    let second = create_sized_pdf(&dir.join("second.pdf"), 1, 300, 300, 0);
    (first, second)
}

fn page_widths(path: &Path) -> Vec<f32> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            media_box[2].as_float().unwrap()
        })
        .collect()
}

fn sent_to(events: &[OutboundEvent], user: i64) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            OutboundEvent::Sent { chat, text, .. } if *chat == UserId(user) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_dispatch_counts_outcomes() {
    let (stats, _) = dispatch(INBOUND).await;

    assert_eq!(
        stats,
        DispatchStats {
            received: 4,
            handled: 2,
            rejected: 2,
            failed: 0,
            panicked: 0,
        }
    );
}

#[tokio::test]
async fn test_dispatch_replies_to_each_user() {
    let (_, events) = dispatch(INBOUND).await;

    let replied_to = |user: i64| {
        events
            .iter()
            .filter(|event| matches!(event, OutboundEvent::Sent { chat, .. } if *chat == UserId(user)))
            .count()
    };

    assert_eq!(events.len(), 3);
    assert_eq!(replied_to(1), 1);
    assert_eq!(replied_to(2), 1);
    assert_eq!(replied_to(3), 0);
    assert_eq!(replied_to(4), 1);

    let welcome = events.iter().find_map(|event| match event {
        OutboundEvent::Sent { chat, text, .. } if *chat == UserId(1) => Some(text),
        _ => None,
    });
    assert!(welcome.unwrap().contains("Hello, Ada!"));
}

#[tokio::test]
async fn test_dispatch_of_empty_stream() {
    let (stats, events) = dispatch("").await;

    assert_eq!(stats, DispatchStats::default());
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_burst_of_documents_is_queued_in_arrival_order() {
    let dir = tempdir().unwrap();
    let (first, second) = large_then_small(dir.path());
    let input = lines(&[
        document(7, 1, &first, "first.pdf"),
        document(7, 2, &second, "second.pdf"),
        text(7, 3, "/merge"),
    ]);

    let (stats, events, manager) = dispatch_in(dir.path(), &input).await;

    assert_eq!(stats.received, 3);
    assert_eq!(stats.handled, 3);
    assert_eq!(
        manager.sessions().status(UserId(7)),
        SessionStatus::WaitingName
    );

    let session = manager.sessions().get(UserId(7)).unwrap();
    let queued: Vec<&str> = session
        .queue()
        .iter()
        .map(|handle| handle.display_name.as_str())
        .collect();
    assert_eq!(queued, ["first.pdf", "second.pdf"]);

    let ask = MessageFormatter::new().render(&Reply::AskForName);
    assert_eq!(sent_to(&events, 7).last(), Some(&ask.as_str()));
}

#[tokio::test]
async fn test_requests_during_merge_are_refused() {
    let dir = tempdir().unwrap();
    let (first, second) = large_then_small(dir.path());
    let input = lines(&[
        document(8, 1, &first, "first.pdf"),
        document(8, 2, &second, "second.pdf"),
        text(8, 3, "/merge"),
        text(8, 4, "Report"),
        text(8, 5, "/cancel"),
        document(8, 6, &second, "late.pdf"),
    ]);

    let (stats, events, manager) = dispatch_in(dir.path(), &input).await;

    assert_eq!(
        stats,
        DispatchStats {
            received: 6,
            handled: 4,
            rejected: 2,
            failed: 0,
            panicked: 0,
        }
    );

    let formatter = MessageFormatter::new();
    let sent = sent_to(&events, 8);
    assert!(sent.contains(&formatter.render(&Reply::MergeLocked).as_str()));
    assert!(sent.contains(&formatter.render(&Reply::Busy).as_str()));

    // Both queued documents, in the order they were sent, then the trailer.
    let merged = dir.path().join("outbox").join("Report.pdf");
    assert_eq!(
        page_widths(&merged),
        [500.0, 500.0, 500.0, 300.0, 500.0]
    );

    assert_eq!(manager.sessions().status(UserId(8)), SessionStatus::Idle);
    assert!(manager.sessions().get(UserId(8)).unwrap().queue().is_empty());
    assert_eq!(manager.store().file_count(), 0);
}
