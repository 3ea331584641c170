//! # Repositories
//!
//! Thin real-time data access over the two collections. Writes validate
//! first and then issue exactly one document creation; reads are live
//! subscriptions except for the single-request fetch.

use std::sync::Arc;

use tm_core::error::{AppError, Result};
use tm_core::models::{
    Comment, CommentInput, RescueQuery, RescueRequest, RescueRequestInput, RescueStatus,
};
use tm_core::traits::{CommentStore, RescueStore};
use tracing::{error, info};
use uuid::Uuid;

use crate::subscription::{Observer, Subscription};

fn newest_first(mut rows: Vec<RescueRequest>) -> Vec<RescueRequest> {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    rows
}

/// Oldest first; ties broken by id so repeated deliveries agree.
pub fn oldest_first(mut rows: Vec<Comment>) -> Vec<Comment> {
    rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    rows
}

#[derive(Clone)]
pub struct RequestRepository {
    store: Arc<dyn RescueStore>,
}

impl RequestRepository {
    pub fn new(store: Arc<dyn RescueStore>) -> Self {
        Self { store }
    }

    /// Validates and writes a new request. Any photo must already be uploaded
    /// and its URL set on the input.
    pub async fn create(&self, input: RescueRequestInput) -> Result<Uuid> {
        let request = input.validate()?;
        let id = self.store.create_rescue(request).await.map_err(|e| {
            error!(error = %e, "rescue request write failed");
            e
        })?;
        info!(rescue_id = %id, "rescue request broadcast");
        Ok(id)
    }

    /// Every request, newest first, re-delivered in full on each change.
    pub async fn subscribe_all(&self, observer: Observer<RescueRequest>) -> Result<Subscription> {
        let feed = self.store.watch_rescues(RescueQuery::All).await?;
        Ok(Subscription::spawn("rescues", feed, observer, newest_first))
    }

    /// Requests that are pending or accepted.
    pub async fn subscribe_active(
        &self,
        observer: Observer<RescueRequest>,
    ) -> Result<Subscription> {
        let query = RescueQuery::StatusIn(vec![RescueStatus::Pending, RescueStatus::Accepted]);
        let feed = self.store.watch_rescues(query).await?;
        Ok(Subscription::spawn("active-rescues", feed, observer, newest_first))
    }

    /// Single-shot read of one request.
    pub async fn fetch_by_id(&self, id: Uuid) -> Result<RescueRequest> {
        self.store
            .get_rescue(id)
            .await?
            .ok_or_else(|| AppError::NotFound("RescueRequest".into(), id.to_string()))
    }

    /// Fetch-once counterpart of `subscribe_all` for a single request: the
    /// observer is called exactly once and no live updates follow. The
    /// returned handle is already inactive.
    pub async fn subscribe_by_id(
        &self,
        id: Uuid,
        mut on_update: impl FnMut(Option<RescueRequest>) + Send,
    ) -> Result<Subscription> {
        let request = self.store.get_rescue(id).await?;
        on_update(request);
        Ok(Subscription::inert("rescue-by-id"))
    }
}

#[derive(Clone)]
pub struct CommentRepository {
    store: Arc<dyn CommentStore>,
}

impl CommentRepository {
    pub fn new(store: Arc<dyn CommentStore>) -> Self {
        Self { store }
    }

    /// Validates and writes a comment; `is_helper` is always false.
    pub async fn create(&self, input: CommentInput) -> Result<Uuid> {
        let comment = input.validate()?;
        let rescue_id = comment.rescue_id;
        let id = self.store.create_comment(comment).await.map_err(|e| {
            error!(%rescue_id, error = %e, "comment write failed");
            e
        })?;
        info!(%rescue_id, comment_id = %id, "comment posted");
        Ok(id)
    }

    /// Comments on one request, oldest first. The store's equality query does
    /// not order its results, so ordering is applied on every delivery.
    pub async fn subscribe_by_request(
        &self,
        rescue_id: Uuid,
        observer: Observer<Comment>,
    ) -> Result<Subscription> {
        let feed = self.store.watch_comments(rescue_id).await?;
        Ok(Subscription::spawn("comments", feed, observer, oldest_first))
    }
}
