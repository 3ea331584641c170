//! Comment feeds: ordering, isolation between threads and teardown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use integration_tests::{
    next, next_matching, recorder, rescue_input, session, stays_quiet, store_only,
};
use tm_app::controllers::ThreadController;
use tm_app::CommentRepository;
use tm_core::error::{AppError, ValidationError};
use tm_core::models::{CommentInput, IssueType, NewComment};
use tm_core::traits::{CommentStore, MockCommentStore};
use tm_store_memory::{ManualClock, MemoryDocumentStore};
use uuid::Uuid;

fn comment(rescue_id: Uuid, text: &str) -> CommentInput {
    CommentInput {
        rescue_id,
        user_id: "rider-2".into(),
        user_name: "kim".into(),
        comment_text: text.into(),
    }
}

#[tokio::test]
async fn comments_are_delivered_oldest_first() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 14, 8, 0, 0).unwrap()));
    let store = Arc::new(MemoryDocumentStore::with_clock(clock.clone()));
    let services = store_only(store.clone());
    let rescue_id = services
        .request_repository()
        .create(rescue_input("rider-1", IssueType::StuckInMud))
        .await
        .unwrap();

    let t1 = Utc.with_ymd_and_hms(2024, 9, 14, 8, 5, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 9, 14, 8, 9, 0).unwrap();
    for (when, text) in [(t2, "second"), (t1, "first")] {
        clock.set(when);
        store
            .create_comment(NewComment {
                rescue_id,
                user_id: "rider-2".into(),
                user_name: "kim".into(),
                comment_text: text.into(),
            })
            .await
            .unwrap();
    }

    let (observer, mut rx) = recorder();
    let _sub = services
        .comment_repository()
        .subscribe_by_request(rescue_id, observer)
        .await
        .unwrap();
    let rows = next(&mut rx).await;
    let texts: Vec<&str> = rows.iter().map(|c| c.comment_text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(rows[0].created_at, t1);
    assert_eq!(rows[1].created_at, t2);
}

#[tokio::test]
async fn threads_do_not_see_each_others_comments() {
    let store = Arc::new(MemoryDocumentStore::new());
    let services = store_only(store.clone());
    let requests = services.request_repository();
    let comments = services.comment_repository();
    let a = requests.create(rescue_input("rider-1", IssueType::FlatTire)).await.unwrap();
    let b = requests.create(rescue_input("rider-1", IssueType::SnowIce)).await.unwrap();

    let (observer, mut rx) = recorder();
    let _sub = comments.subscribe_by_request(a, observer).await.unwrap();
    assert!(next(&mut rx).await.is_empty());

    comments.create(comment(b, "wrong thread")).await.unwrap();
    comments.create(comment(a, "right thread")).await.unwrap();
    let rows = next_matching(&mut rx, |rows| !rows.is_empty()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].comment_text, "right thread");
    assert_eq!(rows[0].rescue_id, a);
}

#[tokio::test]
async fn no_callbacks_after_teardown_and_teardown_twice_is_harmless() {
    let store = Arc::new(MemoryDocumentStore::new());
    let services = store_only(store.clone());
    let rescue_id = services
        .request_repository()
        .create(rescue_input("rider-1", IssueType::Mechanical))
        .await
        .unwrap();
    let comments = services.comment_repository();

    let (observer, mut rx) = recorder();
    let mut sub = comments.subscribe_by_request(rescue_id, observer).await.unwrap();
    assert!(next(&mut rx).await.is_empty());

    sub.unsubscribe();
    sub.unsubscribe();
    assert!(!sub.is_active());

    comments.create(comment(rescue_id, "anyone?")).await.unwrap();
    assert!(stays_quiet(&mut rx, Duration::from_millis(200)).await);
}

#[tokio::test]
async fn whitespace_comment_is_never_written() {
    let mut store = MockCommentStore::new();
    store.expect_create_comment().never();
    let comments = CommentRepository::new(Arc::new(store));

    let err = comments.create(comment(Uuid::new_v4(), "  \n ")).await.unwrap_err();
    assert_eq!(err, AppError::Validation(ValidationError::EmptyComment));
}

#[tokio::test]
async fn thread_screen_posts_under_the_session_name() {
    let store = Arc::new(MemoryDocumentStore::new());
    let services = store_only(store.clone());
    let rescue_id = services
        .request_repository()
        .create(rescue_input("rider-1", IssueType::FlatTire))
        .await
        .unwrap();

    let thread = ThreadController::open(&services, session("helper-3", "jo"), rescue_id)
        .await
        .unwrap();
    assert_eq!(thread.submit_comment("   ").await.unwrap(), None);
    thread.submit_comment("Bringing a pump").await.unwrap().expect("written");

    let mut updates = thread.updates();
    tokio::time::timeout(integration_tests::WAIT, async {
        while thread.comments().is_empty() {
            updates.changed().await.unwrap();
        }
    })
    .await
    .expect("comment delivered");

    let posted = thread.comments();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].user_name, "jo");
    assert!(!posted[0].is_helper);
    thread.close();
}
