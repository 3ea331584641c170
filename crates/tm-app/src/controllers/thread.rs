//! # Thread
//!
//! One rescue request and its live comment thread.

use std::sync::{Arc, Mutex};

use tm_core::error::ValidationError;
use tm_core::models::{Comment, CommentInput, RescueRequest};
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use super::{lock, BusyFlag, ChangeNotifier};
use crate::alert::{Action, Alert};
use crate::repository::CommentRepository;
use crate::session::SessionContext;
use crate::subscription::{Observer, Subscription};
use crate::AppServices;

pub struct ThreadController {
    request: RescueRequest,
    comments: Arc<Mutex<Vec<Comment>>>,
    feed: Mutex<Option<Subscription>>,
    repo: CommentRepository,
    session: SessionContext,
    posting: BusyFlag,
    changes: ChangeNotifier,
}

impl ThreadController {
    /// Reads the request once and starts the live comment feed. A comment
    /// feed that cannot be opened is logged; the thread still shows the
    /// request.
    pub async fn open(
        services: &AppServices,
        session: SessionContext,
        rescue_id: Uuid,
    ) -> Result<Self, Alert> {
        let request = services
            .request_repository()
            .fetch_by_id(rescue_id)
            .await
            .map_err(|e| Alert::from_error(Action::OpenThread, e))?;

        let comments = Arc::new(Mutex::new(Vec::new()));
        let changes = ChangeNotifier::new();
        let repo = services.comment_repository();

        let observer = {
            let comments = comments.clone();
            let changes = changes.clone();
            Observer::new(move |rows: Vec<Comment>| {
                *lock(&comments) = rows;
                changes.bump();
            })
        };
        let feed = match repo.subscribe_by_request(rescue_id, observer).await {
            Ok(sub) => Some(sub),
            Err(err) => {
                error!(%rescue_id, error = %err, "comment feed unavailable");
                None
            }
        };

        Ok(Self {
            request,
            comments,
            feed: Mutex::new(feed),
            repo,
            session,
            posting: BusyFlag::default(),
            changes,
        })
    }

    pub fn request(&self) -> &RescueRequest {
        &self.request
    }

    /// Oldest first.
    pub fn comments(&self) -> Vec<Comment> {
        lock(&self.comments).clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.posting.is_set()
    }

    pub fn updates(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Posts `text` as the signed-in user. Blank text writes nothing and
    /// returns `Ok(None)`. The busy flag is cleared whatever the outcome.
    pub async fn submit_comment(&self, text: &str) -> Result<Option<Uuid>, Alert> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let Some(_guard) = self.posting.try_begin() else {
            return Err(Alert::from_error(Action::PostComment, ValidationError::Busy.into()));
        };

        let input = CommentInput {
            rescue_id: self.request.id,
            user_id: self.session.user_id().to_string(),
            user_name: self.session.display_name().to_string(),
            comment_text: text.to_string(),
        };
        let id = self
            .repo
            .create(input)
            .await
            .map_err(|e| Alert::from_error(Action::PostComment, e))?;
        Ok(Some(id))
    }

    /// Stops the comment feed. Safe to call more than once.
    pub fn close(&self) {
        if let Some(mut sub) = lock(&self.feed).take() {
            sub.unsubscribe();
            info!(rescue_id = %self.request.id, "thread closed");
        }
    }
}

impl Drop for ThreadController {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{services, session, wait_until};
    use chrono::{TimeZone, Utc};
    use tm_core::error::AppError;
    use tm_core::models::{GeoPoint, IssueType, NewComment, RescueRequestInput};
    use tm_core::traits::CommentStore;
    use tm_store_memory::{ManualClock, MemoryDocumentStore};

    async fn seeded(store: &Arc<MemoryDocumentStore>) -> (AppServices, Uuid) {
        let services = services(store.clone());
        let id = services
            .request_repository()
            .create(RescueRequestInput {
                requester_id: "u1".into(),
                location: Some(GeoPoint::new(49.7312, -123.1552)),
                issue_type: Some(IssueType::StuckInMud),
                ..Default::default()
            })
            .await
            .unwrap();
        (services, id)
    }

    #[tokio::test]
    async fn missing_request_is_not_found() {
        let store = Arc::new(MemoryDocumentStore::new());
        let services = services(store);
        let alert = ThreadController::open(&services, session("u1", "sam"), Uuid::new_v4())
            .await
            .err()
            .expect("absent");
        assert_eq!(alert.title, "Not Found");
        assert!(matches!(alert.cause, Some(AppError::NotFound(..))));
    }

    #[tokio::test]
    async fn comments_arrive_oldest_first_whatever_the_write_order() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        let store = Arc::new(MemoryDocumentStore::with_clock(clock.clone()));
        let (services, rescue_id) = seeded(&store).await;
        let thread = ThreadController::open(&services, session("u1", "sam"), rescue_id)
            .await
            .unwrap();
        let mut updates = thread.updates();

        let later = Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        for (at, text) in [(later, "T2"), (earlier, "T1")] {
            clock.set(at);
            store
                .create_comment(NewComment {
                    rescue_id,
                    user_id: "u2".into(),
                    user_name: "kim".into(),
                    comment_text: text.into(),
                })
                .await
                .unwrap();
        }

        wait_until(&mut updates, || thread.comments().len() == 2).await;
        let texts: Vec<String> = thread.comments().into_iter().map(|c| c.comment_text).collect();
        assert_eq!(texts, vec!["T1", "T2"]);
    }

    #[tokio::test]
    async fn submit_writes_as_the_session_user() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (services, rescue_id) = seeded(&store).await;
        let thread = ThreadController::open(&services, session("u7", "alex"), rescue_id)
            .await
            .unwrap();
        let mut updates = thread.updates();

        let id = thread.submit_comment("  On my way  ").await.unwrap();
        assert!(id.is_some());
        wait_until(&mut updates, || thread.comments().len() == 1).await;

        let comment = &thread.comments()[0];
        assert_eq!(comment.comment_text, "On my way");
        assert_eq!(comment.user_id, "u7");
        assert_eq!(comment.user_name, "alex");
        assert!(!comment.is_helper);
        assert!(!thread.is_submitting());
    }

    #[tokio::test]
    async fn blank_comment_writes_nothing() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (services, rescue_id) = seeded(&store).await;
        let thread = ThreadController::open(&services, session("u1", "sam"), rescue_id)
            .await
            .unwrap();
        assert_eq!(thread.submit_comment(" \n\t ").await, Ok(None));
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(thread.comments().is_empty());
    }

    #[tokio::test]
    async fn failed_post_clears_the_busy_flag() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (services, rescue_id) = seeded(&store).await;
        let thread = ThreadController::open(&services, session("u1", "sam"), rescue_id)
            .await
            .unwrap();

        store.set_offline(true);
        let alert = thread.submit_comment("anyone near?").await.unwrap_err();
        assert_eq!(alert.message, "Failed to post comment. Please try again.");
        assert!(!thread.is_submitting());

        let long = "x".repeat(501);
        store.set_offline(false);
        let alert = thread.submit_comment(&long).await.unwrap_err();
        assert_eq!(alert.title, "Too Long");
    }

    #[tokio::test]
    async fn close_stops_the_feed() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (services, rescue_id) = seeded(&store).await;
        let thread = ThreadController::open(&services, session("u1", "sam"), rescue_id)
            .await
            .unwrap();
        let mut updates = thread.updates();
        wait_until(&mut updates, || updates_seen(&thread) > 0).await;

        thread.close();
        thread.close();
        thread.submit_comment("late").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(thread.comments().is_empty());
    }

    fn updates_seen(thread: &ThreadController) -> u64 {
        let rx = thread.updates();
        let v = *rx.borrow();
        v
    }
}
