//! What the repositories ask of the store ports, checked against mocks.

use std::sync::Arc;

use chrono::{Duration, Utc};
use integration_tests::{next, recorder, rescue_input};
use mockall::predicate::eq;
use tm_app::{CommentRepository, RequestRepository};
use tm_core::error::AppError;
use tm_core::feed;
use tm_core::models::{Comment, IssueType, RescueQuery, RescueStatus};
use tm_core::traits::{MockCommentStore, MockRescueStore};
use uuid::Uuid;

fn comment(rescue_id: Uuid, text: &str, minutes_ago: i64) -> Comment {
    Comment {
        id: Uuid::new_v4(),
        rescue_id,
        user_id: "rider-2".into(),
        user_name: "kim".into(),
        comment_text: text.into(),
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        is_helper: false,
    }
}

#[tokio::test]
async fn create_sends_the_validated_request_once() {
    let mut store = MockRescueStore::new();
    let id = Uuid::new_v4();
    store
        .expect_create_rescue()
        .withf(|req| {
            req.requester_id == "rider-1"
                && req.issue_type == IssueType::Mechanical
                && req.additional_details.is_empty()
                && req.photo_url.is_none()
        })
        .times(1)
        .returning(move |_| Ok(id));
    let requests = RequestRepository::new(Arc::new(store));
    assert_eq!(requests.create(rescue_input("rider-1", IssueType::Mechanical)).await, Ok(id));
}

#[tokio::test]
async fn active_subscription_asks_for_pending_and_accepted() {
    let mut store = MockRescueStore::new();
    store
        .expect_watch_rescues()
        .with(eq(RescueQuery::StatusIn(vec![
            RescueStatus::Pending,
            RescueStatus::Accepted,
        ])))
        .times(1)
        .return_once(|_| {
            let (_tx, feed) = feed::channel();
            Ok(feed)
        });
    let requests = RequestRepository::new(Arc::new(store));
    let (observer, _rx) = recorder();
    requests.subscribe_active(observer).await.unwrap();
}

#[tokio::test]
async fn unordered_comment_results_are_sorted_before_delivery() {
    let rescue_id = Uuid::new_v4();
    let (tx, feed) = feed::channel();
    let mut store = MockCommentStore::new();
    store
        .expect_watch_comments()
        .with(eq(rescue_id))
        .return_once(move |_| Ok(feed));
    let comments = CommentRepository::new(Arc::new(store));

    let (observer, mut rx) = recorder();
    let _sub = comments.subscribe_by_request(rescue_id, observer).await.unwrap();
    tx.snapshot(vec![
        comment(rescue_id, "newest", 1),
        comment(rescue_id, "oldest", 30),
        comment(rescue_id, "middle", 10),
    ]);

    let rows = next(&mut rx).await;
    let texts: Vec<&str> = rows.iter().map(|c| c.comment_text.as_str()).collect();
    assert_eq!(texts, vec!["oldest", "middle", "newest"]);
}

#[tokio::test]
async fn refused_subscription_surfaces_as_an_error() {
    let mut store = MockRescueStore::new();
    store
        .expect_watch_rescues()
        .returning(|_| Err(AppError::SubscribeFailure("permission denied".into())));
    let requests = RequestRepository::new(Arc::new(store));
    let (observer, _rx) = recorder();
    let result = requests.subscribe_all(observer).await;
    assert!(matches!(result, Err(AppError::SubscribeFailure(_))));
}
