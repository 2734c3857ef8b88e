//! Integration tests for the session state machine.

use pdfmerge::output::MessageFormatter;
use pdfmerge::transport::{MessageBody, RemoteFile};
use pdfmerge::{InboundMessage, MergeBotError, Outcome, Reply, SessionStatus, UserId};
use tempfile::tempdir;

use crate::common::{RecordingTransport, create_test_pdf, document, manager, sender, text};

fn render(reply: &Reply) -> String {
    MessageFormatter::new().render(reply)
}

#[tokio::test]
async fn test_merge_with_one_document_is_refused() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let pdf = create_test_pdf(&dir.path().join("a.pdf"), 1);

    let queued = manager.handle(document(1, 1, &pdf, "a.pdf")).await.unwrap();
    assert_eq!(queued, Outcome::DocumentQueued { queue_len: 1 });

    let result = manager.handle(text(1, 2, "/merge")).await;
    assert!(matches!(
        result,
        Err(MergeBotError::InsufficientDocuments {
            queued: 1,
            required: 2
        })
    ));
    assert_eq!(manager.sessions().status(UserId(1)), SessionStatus::Idle);
    assert!(
        transport
            .sent_texts()
            .contains(&render(&Reply::NeedMoreDocuments { required: 2 }))
    );
}

#[tokio::test]
async fn test_full_merge_flow_delivers_named_document() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let first = create_test_pdf(&dir.path().join("first.pdf"), 10);
    let second = create_test_pdf(&dir.path().join("second.pdf"), 10);

    manager.handle(document(7, 1, &first, "first.pdf")).await.unwrap();
    let queued = manager.handle(document(7, 2, &second, "second.pdf")).await.unwrap();
    assert_eq!(queued, Outcome::DocumentQueued { queue_len: 2 });
    assert_eq!(manager.store().file_count(), 2);

    let asked = manager.handle(text(7, 3, "/merge")).await.unwrap();
    assert_eq!(asked, Outcome::AwaitingName);
    assert_eq!(manager.sessions().status(UserId(7)), SessionStatus::WaitingName);

    let merged = manager.handle(text(7, 4, "Report")).await.unwrap();
    assert_eq!(
        merged,
        Outcome::Merged {
            output_name: "Report.pdf".into(),
            files: 2,
            pages: 21,
        }
    );

    let documents = transport.documents();
    assert_eq!(documents.len(), 1);
    let (name, pages, caption) = &documents[0];
    assert_eq!(name, "Report.pdf");
    assert_eq!(*pages, 21);
    assert!(caption.contains("`2 Files`"));
    assert!(caption.contains("Ada"));

    assert_eq!(manager.sessions().status(UserId(7)), SessionStatus::Idle);
    assert!(manager.sessions().get(UserId(7)).unwrap().queue().is_empty());
    assert_eq!(manager.store().file_count(), 0);
}

#[tokio::test]
async fn test_successful_merge_deletes_status_message() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let pdf = create_test_pdf(&dir.path().join("a.pdf"), 2);

    manager.handle(document(3, 1, &pdf, "a.pdf")).await.unwrap();
    manager.handle(document(3, 2, &pdf, "b.pdf")).await.unwrap();
    manager.handle(text(3, 3, "/merge")).await.unwrap();
    manager.handle(text(3, 4, "notes")).await.unwrap();

    let processing = render(&Reply::Processing {
        output_name: "notes.pdf".into(),
    });
    let status = transport
        .events()
        .into_iter()
        .find_map(|e| match e {
            crate::common::Recorded::Sent { message, text } if text == processing => Some(message),
            _ => None,
        })
        .expect("processing message was sent");

    assert!(
        transport
            .events()
            .contains(&crate::common::Recorded::Deleted { message: status })
    );
}

#[tokio::test]
async fn test_non_pdf_document_is_rejected() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let pdf = create_test_pdf(&dir.path().join("a.pdf"), 1);
    manager.handle(document(2, 1, &pdf, "a.pdf")).await.unwrap();

    let result = manager.handle(document(2, 2, &pdf, "notes.txt")).await;

    assert!(matches!(result, Err(MergeBotError::InvalidDocumentType { .. })));
    assert_eq!(manager.sessions().get(UserId(2)).unwrap().queue().len(), 1);
    assert_eq!(transport.sent_texts().last().unwrap(), &render(&Reply::InvalidDocument));
}

#[tokio::test]
async fn test_media_message_is_rejected() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;

    let result = manager
        .handle(InboundMessage {
            sender: sender(2),
            message_id: 1,
            body: MessageBody::Media {
                kind: "photo".into(),
            },
        })
        .await;

    assert!(matches!(result, Err(MergeBotError::InvalidDocumentType { .. })));
    assert_eq!(transport.sent_texts(), [render(&Reply::InvalidDocument)]);
}

#[tokio::test]
async fn test_empty_download_is_discarded() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let empty = dir.path().join("empty.pdf");
    std::fs::write(&empty, b"").unwrap();

    let result = manager.handle(document(4, 1, &empty, "empty.pdf")).await;

    assert!(matches!(result, Err(MergeBotError::EmptyOrCorruptDownload { .. })));
    assert_eq!(manager.store().file_count(), 0);
    assert_eq!(manager.sessions().status(UserId(4)), SessionStatus::Idle);
    assert!(manager.sessions().get(UserId(4)).unwrap().queue().is_empty());
    assert_eq!(transport.edits(), [render(&Reply::DownloadFailed)]);
}

#[tokio::test]
async fn test_failed_download_reports_error() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;

    let message = InboundMessage {
        sender: sender(4),
        message_id: 9,
        body: MessageBody::Document {
            file: RemoteFile {
                source: dir.path().join("missing.pdf").to_string_lossy().into_owned(),
                file_name: Some("missing.pdf".into()),
                file_size: 100,
                mime_type: None,
            },
        },
    };
    let result = manager.handle(message).await;

    assert!(matches!(result, Err(MergeBotError::Transport { .. })));
    assert_eq!(manager.store().file_count(), 0);
    let edits = transport.edits();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].starts_with("❌ **Error:**"));
}

#[tokio::test]
async fn test_cancel_during_merge_is_rejected() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    manager.sessions().with_session(UserId(5), |s| {
        s.begin_naming(0).unwrap();
        assert!(s.begin_merge());
    });

    let cancel = manager.handle(text(5, 1, "/cancel")).await;
    assert!(matches!(cancel, Err(MergeBotError::SessionBusy)));
    assert_eq!(transport.sent_texts(), [render(&Reply::MergeLocked)]);

    let start = manager.handle(text(5, 2, "/start")).await;
    assert!(matches!(start, Err(MergeBotError::SessionBusy)));

    let merge = manager.handle(text(5, 3, "/merge")).await;
    assert!(matches!(merge, Err(MergeBotError::SessionBusy)));

    assert_eq!(manager.sessions().status(UserId(5)), SessionStatus::Merging);
}

#[tokio::test]
async fn test_document_while_waiting_for_name_is_busy() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let pdf = create_test_pdf(&dir.path().join("a.pdf"), 1);
    manager.handle(document(6, 1, &pdf, "a.pdf")).await.unwrap();
    manager.handle(document(6, 2, &pdf, "b.pdf")).await.unwrap();
    manager.handle(text(6, 3, "/merge")).await.unwrap();

    let result = manager.handle(document(6, 4, &pdf, "c.pdf")).await;

    assert!(matches!(result, Err(MergeBotError::SessionBusy)));
    assert_eq!(manager.sessions().get(UserId(6)).unwrap().queue().len(), 2);
    assert_eq!(manager.store().file_count(), 2);
    assert_eq!(transport.sent_texts().last().unwrap(), &render(&Reply::Busy));
}

#[tokio::test]
async fn test_start_clears_queued_files() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let pdf = create_test_pdf(&dir.path().join("a.pdf"), 1);
    manager.handle(document(8, 1, &pdf, "a.pdf")).await.unwrap();
    manager.handle(document(8, 2, &pdf, "b.pdf")).await.unwrap();
    manager.handle(text(8, 3, "/merge")).await.unwrap();

    let outcome = manager.handle(text(8, 4, "/start")).await.unwrap();

    assert_eq!(outcome, Outcome::Welcomed { released: 2 });
    assert_eq!(manager.store().file_count(), 0);
    assert_eq!(manager.sessions().status(UserId(8)), SessionStatus::Idle);
    assert_eq!(
        transport.sent_texts().last().unwrap(),
        &render(&Reply::Welcome { name: "Ada".into() })
    );
}

#[tokio::test]
async fn test_cancel_with_and_without_queue() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let pdf = create_test_pdf(&dir.path().join("a.pdf"), 1);

    let nothing = manager.handle(text(9, 1, "/cancel")).await.unwrap();
    assert_eq!(nothing, Outcome::Cancelled { released: 0 });

    manager.handle(document(9, 2, &pdf, "a.pdf")).await.unwrap();
    let cleared = manager.handle(text(9, 3, "/cancel")).await.unwrap();
    assert_eq!(cleared, Outcome::Cancelled { released: 1 });
    assert_eq!(manager.store().file_count(), 0);

    let texts = transport.sent_texts();
    assert_eq!(texts[0], render(&Reply::NothingToCancel));
    assert_eq!(texts.last().unwrap(), &render(&Reply::QueueCleared));
}

#[tokio::test]
async fn test_text_outside_naming_is_ignored() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;

    let outcome = manager.handle(text(10, 1, "hello there")).await.unwrap();

    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_failed_merge_returns_to_idle_and_releases_queue() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let garbage = dir.path().join("garbage.pdf");
    std::fs::write(&garbage, b"this is not a pdf").unwrap();

    manager.handle(document(11, 1, &garbage, "a.pdf")).await.unwrap();
    manager.handle(document(11, 2, &garbage, "b.pdf")).await.unwrap();
    manager.handle(text(11, 3, "/merge")).await.unwrap();

    let result = manager.handle(text(11, 4, "broken")).await;

    assert!(matches!(result, Err(MergeBotError::FailedToLoadPdf { .. })));
    assert_eq!(manager.sessions().status(UserId(11)), SessionStatus::Idle);
    assert!(manager.sessions().get(UserId(11)).unwrap().queue().is_empty());
    assert_eq!(manager.store().file_count(), 0);
    assert!(transport.documents().is_empty());
    assert!(transport.edits().last().unwrap().starts_with("❌ **Failed:**"));
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let dir = tempdir().unwrap();
    let transport = RecordingTransport::new();
    let manager = manager(dir.path(), transport.clone()).await;
    let pdf = create_test_pdf(&dir.path().join("a.pdf"), 1);

    manager.handle(document(20, 1, &pdf, "a.pdf")).await.unwrap();
    manager.handle(document(20, 2, &pdf, "b.pdf")).await.unwrap();
    manager.handle(text(20, 3, "/merge")).await.unwrap();
    manager.handle(document(21, 1, &pdf, "c.pdf")).await.unwrap();

    assert_eq!(manager.sessions().status(UserId(20)), SessionStatus::WaitingName);
    assert_eq!(manager.sessions().status(UserId(21)), SessionStatus::Idle);
    assert_eq!(manager.sessions().len(), 2);
}
