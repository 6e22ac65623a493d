//! Session manager integration tests
//!
//! Drive selection, queueing and finalize against a temp watched folder with
//! fake catalog and normalizer.

mod helpers;

use helpers::{TestSession, CORRUPT_MARKER, NORMALIZED_PREFIX};
use snapshelf_common::events::IntakeEvent;
use snapshelf_intake::models::FinalizeWarning;
use snapshelf_intake::services::CatalogError;
use snapshelf_intake::SessionError;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Selection and intake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_photo_without_selection_is_not_queued() {
    let t = TestSession::new();

    assert!(!t.drop_photo("a.jpg", b"a").await);

    // Selecting afterwards does not pick it up retroactively
    t.select("1", "Red Hat").await;
    assert!(t.queued().await.is_empty());
    assert!(t.root().join("a.jpg").exists());
}

#[tokio::test]
async fn test_photos_queue_in_arrival_order() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;

    assert!(t.drop_photo("b.jpg", b"b").await);
    assert!(t.drop_photo("a.jpg", b"a").await);
    assert!(t.drop_photo("sub/c.PNG", b"c").await);

    assert_eq!(t.queued().await, vec!["b.jpg", "a.jpg", "sub/c.PNG"]);
    assert_eq!(t.session.current().await.queue_length, 3);
}

#[tokio::test]
async fn test_duplicate_events_queue_once() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;

    let path = t.write_photo("a.jpg", b"a");
    assert!(t.session.on_file_appeared(&path).await);
    assert!(!t.session.on_file_appeared(&path).await);

    // Same file reached through a non-normalized path
    let dotted = t.root().join("sub").join("..").join("a.jpg");
    assert!(!t.session.on_file_appeared(&dotted).await);

    assert_eq!(t.queued().await, vec!["a.jpg"]);
}

#[tokio::test]
async fn test_unrecognized_and_outside_files_ignored() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;

    assert!(!t.drop_photo("notes.txt", b"x").await);
    assert!(!t.drop_photo("a.jpg.part", b"x").await);

    let outside = tempfile::tempdir().unwrap();
    let foreign = outside.path().join("x.jpg");
    std::fs::write(&foreign, b"x").unwrap();
    assert!(!t.session.on_file_appeared(&foreign).await);

    // Event for a file that was already removed
    assert!(!t.session.on_file_appeared(&t.root().join("gone.jpg")).await);

    assert!(t.queued().await.is_empty());
}

#[tokio::test]
async fn test_select_resets_queue_and_leaves_files() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    t.drop_photo("b.jpg", b"b").await;

    t.select("2", "Blue Scarf").await;

    let current = t.session.current().await;
    assert_eq!(current.selection.unwrap().item_id, "2");
    assert_eq!(current.queue_length, 0);
    assert!(t.root().join("a.jpg").exists());
    assert!(t.root().join("b.jpg").exists());
}

#[tokio::test]
async fn test_select_rejects_blank_item_id() {
    let t = TestSession::new();

    let err = t.session.select("  ", None, None, None).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidRequest(_)));
    assert!(t.session.current().await.selection.is_none());
}

#[tokio::test]
async fn test_clear_selection_stops_intake() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    t.session.clear_selection().await;

    assert!(t.session.current().await.selection.is_none());
    assert!(!t.drop_photo("b.jpg", b"b").await);
    assert!(t.root().join("a.jpg").exists());
}

// ---------------------------------------------------------------------------
// Remove and reorder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_remove_photo_deletes_file() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    t.drop_photo("b.jpg", b"b").await;

    t.session.remove_photo("a.jpg").await.unwrap();

    assert_eq!(t.queued().await, vec!["b.jpg"]);
    assert!(!t.root().join("a.jpg").exists());
}

#[tokio::test]
async fn test_remove_unqueued_photo_is_not_found_and_keeps_file() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.write_photo("stray.jpg", b"x");

    let err = t.session.remove_photo("stray.jpg").await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
    assert!(t.root().join("stray.jpg").exists());
}

#[tokio::test]
async fn test_remove_rejects_paths_outside_root() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    for bad in ["../../etc/passwd", "../a.jpg", "/etc/passwd", "sub/../../a.jpg", ""] {
        let err = t.session.remove_photo(bad).await.unwrap_err();
        assert!(
            matches!(err, SessionError::InvalidPath(_)),
            "{:?} should be rejected, got {:?}",
            bad,
            err
        );
    }
    assert_eq!(t.queued().await, vec!["a.jpg"]);
}

#[tokio::test]
async fn test_reorder_partial_ordering() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        t.drop_photo(name, name.as_bytes()).await;
    }

    let matched = t
        .session
        .reorder(&["b.jpg".to_string(), "a.jpg".to_string()])
        .await
        .unwrap();

    assert_eq!(matched, 2);
    assert_eq!(t.queued().await, vec!["b.jpg", "a.jpg", "c.jpg"]);
}

#[tokio::test]
async fn test_reorder_skips_unknown_paths() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        t.drop_photo(name, name.as_bytes()).await;
    }

    let order = vec![
        "../escape.jpg".to_string(),
        "c.jpg".to_string(),
        "missing.jpg".to_string(),
        "c.jpg".to_string(),
    ];
    assert_eq!(t.session.reorder(&order).await.unwrap(), 1);
    assert_eq!(t.queued().await, vec!["c.jpg", "a.jpg", "b.jpg"]);
}

#[tokio::test]
async fn test_reorder_without_matches_is_invalid_request() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    let err = t.session.reorder(&[]).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidRequest(_)));

    let err = t
        .session
        .reorder(&["zzz.jpg".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidRequest(_)));
    assert_eq!(t.queued().await, vec!["a.jpg"]);
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_preview_entries_encode_paths_and_skip_missing() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.drop_photo("my photo.jpg", b"a").await;
    t.drop_photo("gone.jpg", b"b").await;
    std::fs::remove_file(t.root().join("gone.jpg")).unwrap();

    let photos = t.session.list_queued_for_preview().await;
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].display_name, "my photo.jpg");
    assert_eq!(photos[0].relative_path, "my photo.jpg");
    assert_eq!(photos[0].preview_url.as_deref(), Some("/preview/my%20photo.jpg"));

    // Still queued even though hidden
    assert_eq!(t.session.current().await.queue_length, 2);
}

#[tokio::test]
async fn test_queued_file_only_exposes_queued_photos() {
    let t = TestSession::new();
    t.select("1", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    t.write_photo("private.jpg", b"x");

    assert_eq!(
        t.session.queued_file("a.jpg").await.unwrap(),
        t.root().join("a.jpg")
    );
    assert!(matches!(
        t.session.queued_file("private.jpg").await,
        Err(SessionError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_finalize_requires_selection_and_files() {
    let t = TestSession::new();

    let err = t.session.finalize().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));

    t.select("1", "Red Hat").await;
    let err = t.session.finalize().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));
    assert!(t.catalog.uploads().is_empty());
}

#[tokio::test]
async fn test_finalize_uploads_in_queue_order_and_clears() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("b.png", b"bbb").await;
    t.drop_photo("a.jpg", b"aaa").await;
    t.drop_photo("c.jpeg", b"ccc").await;
    t.session
        .reorder(&["c.jpeg".to_string()])
        .await
        .unwrap();

    let outcome = t.session.finalize().await.unwrap();

    assert_eq!(outcome.item_id, "42");
    assert_eq!(outcome.uploaded, 3);
    assert!(outcome.published);
    assert!(outcome.is_clean(), "unexpected warnings: {:?}", outcome.warnings);

    let uploads = t.catalog.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].item_id, "42");
    assert_eq!(uploads[0].filenames(), vec!["c.jpg", "b.jpg", "a.jpg"]);
    assert!(uploads[0].images[0].bytes.starts_with(NORMALIZED_PREFIX));
    assert_eq!(t.catalog.published(), vec!["42"]);

    for name in ["a.jpg", "b.png", "c.jpeg"] {
        assert!(!t.root().join(name).exists(), "{} should be deleted", name);
    }
    let current = t.session.current().await;
    assert!(current.selection.is_none());
    assert_eq!(current.queue_length, 0);
}

#[tokio::test]
async fn test_failed_upload_keeps_everything_for_retry() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    t.drop_photo("b.jpg", b"b").await;
    t.catalog.set_fail_uploads(true);

    let err = t.session.finalize().await.unwrap_err();
    assert!(matches!(err, SessionError::Upstream(_)));

    let current = t.session.current().await;
    assert_eq!(current.selection.unwrap().item_id, "42");
    assert_eq!(t.queued().await, vec!["a.jpg", "b.jpg"]);
    assert!(t.root().join("a.jpg").exists());
    assert!(t.catalog.published().is_empty());

    // Retry succeeds once the catalog is back
    t.catalog.set_fail_uploads(false);
    let outcome = t.session.finalize().await.unwrap();
    assert_eq!(outcome.uploaded, 2);
    assert!(t.session.current().await.selection.is_none());
}

#[tokio::test]
async fn test_upload_timeout_keeps_everything_for_retry() {
    let t = TestSession::with_upload_timeout(Duration::from_millis(50));
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    // Never released while finalize waits
    let _held = t.catalog.hold_next_upload();

    let err = t.session.finalize().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Upstream(CatalogError::Timeout(_))
    ));
    assert_eq!(err.code(), "UPSTREAM_FAILURE");

    let current = t.session.current().await;
    assert_eq!(current.selection.unwrap().item_id, "42");
    assert_eq!(t.queued().await, vec!["a.jpg"]);
    assert!(t.root().join("a.jpg").exists());
    assert!(t.catalog.uploads().is_empty());
    assert!(t.catalog.published().is_empty());

    let outcome = t.session.finalize().await.unwrap();
    assert_eq!(outcome.uploaded, 1);
}

#[tokio::test]
async fn test_normalization_failure_uploads_original() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    let mut corrupt = CORRUPT_MARKER.to_vec();
    corrupt.extend_from_slice(b" heic bytes");
    t.drop_photo("a.heic", &corrupt).await;
    t.drop_photo("b.jpg", b"b").await;

    let outcome = t.session.finalize().await.unwrap();

    assert_eq!(outcome.uploaded, 2);
    assert!(matches!(
        &outcome.warnings[..],
        [FinalizeWarning::NormalizationFallback { file, .. }] if file == "a.heic"
    ));

    let uploads = t.catalog.uploads();
    assert_eq!(uploads[0].filenames(), vec!["a.heic", "b.jpg"]);
    assert_eq!(uploads[0].images[0].bytes, corrupt);
}

#[tokio::test]
async fn test_missing_file_is_skipped_with_warning() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    t.drop_photo("b.jpg", b"b").await;
    std::fs::remove_file(t.root().join("a.jpg")).unwrap();

    let outcome = t.session.finalize().await.unwrap();

    assert_eq!(outcome.uploaded, 1);
    assert_eq!(
        outcome.warnings,
        vec![FinalizeWarning::MissingFile {
            file: "a.jpg".to_string()
        }]
    );
    assert_eq!(t.catalog.uploads()[0].filenames(), vec!["b.jpg"]);
    assert!(t.session.current().await.selection.is_none());
}

#[tokio::test]
async fn test_all_files_missing_fails_without_upload() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    std::fs::remove_file(t.root().join("a.jpg")).unwrap();

    let err = t.session.finalize().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));
    assert!(t.catalog.uploads().is_empty());
    assert!(t.session.current().await.selection.is_some());
}

#[tokio::test]
async fn test_publish_failure_is_a_warning() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    t.catalog.set_fail_publish(true);

    let outcome = t.session.finalize().await.unwrap();

    assert!(!outcome.published);
    assert_eq!(outcome.uploaded, 1);
    assert!(matches!(
        &outcome.warnings[..],
        [FinalizeWarning::PublishFailed { .. }]
    ));
    assert!(!t.root().join("a.jpg").exists());
    assert!(t.session.current().await.selection.is_none());
}

#[tokio::test]
async fn test_archive_mode_moves_originals_under_title_folder() {
    let t = TestSession::with_archive();
    t.select("42", "Red/Hat: XL").await;
    t.drop_photo("a.jpg", b"a").await;
    t.drop_photo("sub/b.jpg", b"b").await;

    let outcome = t.session.finalize().await.unwrap();
    assert!(outcome.is_clean(), "unexpected warnings: {:?}", outcome.warnings);

    let folder = t.archive_dir.as_ref().unwrap().path().join("RedHat XL");
    assert_eq!(std::fs::read(folder.join("a.jpg")).unwrap(), b"a");
    assert_eq!(std::fs::read(folder.join("b.jpg")).unwrap(), b"b");
    assert!(!t.root().join("a.jpg").exists());
    assert!(!t.root().join("sub/b.jpg").exists());
}

#[tokio::test]
async fn test_photo_arriving_during_upload_stays_queued() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    let release = t.catalog.hold_next_upload();
    let session = Arc::clone(&t.session);
    let finalize = tokio::spawn(async move { session.finalize().await });

    t.catalog.upload_started.notified().await;
    assert!(t.drop_photo("late.jpg", b"late").await);
    release.send(()).unwrap();

    let outcome = finalize.await.unwrap().unwrap();
    assert_eq!(outcome.uploaded, 1);
    assert_eq!(
        outcome.warnings,
        vec![FinalizeWarning::LateArrivals { count: 1 }]
    );

    let current = t.session.current().await;
    assert_eq!(current.selection.unwrap().item_id, "42");
    assert_eq!(t.queued().await, vec!["late.jpg"]);
    assert!(t.root().join("late.jpg").exists());
    assert!(!t.root().join("a.jpg").exists());
}

#[tokio::test]
async fn test_selection_made_during_upload_is_not_cleared() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    let release = t.catalog.hold_next_upload();
    let session = Arc::clone(&t.session);
    let finalize = tokio::spawn(async move { session.finalize().await });

    t.catalog.upload_started.notified().await;
    t.select("7", "Blue Scarf").await;
    assert!(t.drop_photo("next.jpg", b"n").await);
    release.send(()).unwrap();

    let outcome = finalize.await.unwrap().unwrap();
    assert_eq!(outcome.item_id, "42");
    assert_eq!(t.catalog.uploads()[0].filenames(), vec!["a.jpg"]);

    let current = t.session.current().await;
    assert_eq!(current.selection.unwrap().item_id, "7");
    assert_eq!(t.queued().await, vec!["next.jpg"]);
}

#[tokio::test]
async fn test_concurrent_finalize_is_rejected() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    let release = t.catalog.hold_next_upload();
    let session = Arc::clone(&t.session);
    let first = tokio::spawn(async move { session.finalize().await });

    t.catalog.upload_started.notified().await;
    let err = t.session.finalize().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));

    release.send(()).unwrap();
    assert!(first.await.unwrap().is_ok());
    assert_eq!(t.catalog.uploads().len(), 1);
}

#[tokio::test]
async fn test_cancelled_finalize_can_be_retried() {
    let t = TestSession::new();
    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;

    let _release = t.catalog.hold_next_upload();
    let session = Arc::clone(&t.session);
    let first = tokio::spawn(async move { session.finalize().await });

    t.catalog.upload_started.notified().await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    // Nothing was uploaded, so the queue is intact
    assert_eq!(t.queued().await, vec!["a.jpg"]);

    let outcome = t.session.finalize().await.unwrap();
    assert_eq!(outcome.uploaded, 1);
    assert_eq!(t.catalog.uploads().len(), 1);
    assert!(t.session.current().await.selection.is_none());
}

#[tokio::test]
async fn test_events_follow_session_changes() {
    let t = TestSession::new();
    let mut rx = t.event_bus.subscribe();

    t.select("42", "Red Hat").await;
    t.drop_photo("a.jpg", b"a").await;
    t.session.finalize().await.unwrap();

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(
        types,
        vec![
            "SelectionChanged",
            "PhotoQueued",
            "FinalizeStarted",
            "SelectionChanged",
            "FinalizeCompleted",
        ]
    );

    // Queue length travels with the queued event
    t.select("43", "Hat").await;
    t.drop_photo("b.jpg", b"b").await;
    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert!(matches!(
        last,
        Some(IntakeEvent::PhotoQueued { queue_length: 1, .. })
    ));
}
