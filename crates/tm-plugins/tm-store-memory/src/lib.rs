//! # tm-store-memory
//!
//! In-process implementation of the `rescues` and `comments` collections.
//! Documents are kept as flat JSON mappings, the same shape a hosted document
//! store would hold, and mapped back to domain models on every read.
//! Standing queries receive the full current result set on establishment and
//! after every add, modify or remove that touches them.

pub mod clock;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tm_core::error::{AppError, Result, ValidationError};
use tm_core::feed::{self, FeedSender, LiveFeed};
use tm_core::models::{
    Comment, NewComment, NewRescueRequest, RescueQuery, RescueRequest, RescueStatus,
};
use tm_core::traits::{CommentStore, RescueStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use clock::{Clock, ManualClock, SystemClock};

/// Value written to `source` for requests created through the app.
pub const APP_SOURCE: &str = "app";

struct RescueWatcher {
    query: RescueQuery,
    tx: FeedSender<RescueRequest>,
}

struct CommentWatcher {
    rescue_id: Uuid,
    tx: FeedSender<Comment>,
}

pub struct MemoryDocumentStore {
    rescues: DashMap<Uuid, Value>,
    comments: DashMap<Uuid, Value>,
    rescue_watchers: Mutex<Vec<RescueWatcher>>,
    comment_watchers: Mutex<Vec<CommentWatcher>>,
    clock: Arc<dyn Clock>,
    offline: AtomicBool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

// Helper for document mapping
fn encode<T: serde::Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| AppError::WriteFailure(e.to_string()))
}

fn decode<T: DeserializeOwned>(id: &Uuid, doc: &Value) -> Option<T> {
    match serde_json::from_value(doc.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(doc_id = %id, error = %e, "skipping malformed document");
            None
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::default()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rescues: DashMap::new(),
            comments: DashMap::new(),
            rescue_watchers: Mutex::new(Vec::new()),
            comment_watchers: Mutex::new(Vec::new()),
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulates losing the backend: writes, reads and new subscriptions fail.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Breaks every open feed with an error, as a dropped connection would.
    pub fn break_feeds(&self, reason: &str) {
        for w in lock(&self.rescue_watchers).drain(..) {
            w.tx.error(reason);
        }
        for w in lock(&self.comment_watchers).drain(..) {
            w.tx.error(reason);
        }
        warn!(reason, "all live feeds broken");
    }

    /// Standing queries whose subscriber is still listening.
    pub fn open_feed_count(&self) -> usize {
        let rescues = lock(&self.rescue_watchers)
            .iter()
            .filter(|w| !w.tx.is_closed())
            .count();
        let comments = lock(&self.comment_watchers)
            .iter()
            .filter(|w| !w.tx.is_closed())
            .count();
        rescues + comments
    }

    fn ensure_online(&self) -> std::result::Result<(), &'static str> {
        if self.offline.load(Ordering::SeqCst) {
            Err("document store unreachable")
        } else {
            Ok(())
        }
    }

    fn rescue_snapshot(&self, query: &RescueQuery) -> Vec<RescueRequest> {
        let mut rows: Vec<RescueRequest> = self
            .rescues
            .iter()
            .filter_map(|entry| decode::<RescueRequest>(entry.key(), entry.value()))
            .filter(|r| query.matches(r))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows
    }

    /// Map iteration order; the equality query makes no ordering promise.
    fn comment_snapshot(&self, rescue_id: Uuid) -> Vec<Comment> {
        self.comments
            .iter()
            .filter_map(|entry| decode::<Comment>(entry.key(), entry.value()))
            .filter(|c| c.rescue_id == rescue_id)
            .collect()
    }

    fn notify_rescues(&self, before: Option<&RescueRequest>, after: Option<&RescueRequest>) {
        let mut watchers = lock(&self.rescue_watchers);
        watchers.retain(|w| !w.tx.is_closed());
        for w in watchers.iter() {
            let touched = before.is_some_and(|r| w.query.matches(r))
                || after.is_some_and(|r| w.query.matches(r));
            if touched {
                w.tx.snapshot(self.rescue_snapshot(&w.query));
            }
        }
    }

    fn notify_comments(&self, rescue_id: Uuid) {
        let mut watchers = lock(&self.comment_watchers);
        watchers.retain(|w| !w.tx.is_closed());
        for w in watchers.iter().filter(|w| w.rescue_id == rescue_id) {
            w.tx.snapshot(self.comment_snapshot(rescue_id));
        }
    }

    fn load_rescue(&self, id: Uuid) -> Option<RescueRequest> {
        let doc = self.rescues.get(&id)?;
        decode(&id, doc.value())
    }
}

#[async_trait]
impl RescueStore for MemoryDocumentStore {
    async fn create_rescue(&self, request: NewRescueRequest) -> Result<Uuid> {
        self.ensure_online()
            .map_err(|e| AppError::WriteFailure(e.into()))?;

        let record = RescueRequest {
            id: Uuid::new_v4(),
            requester_id: request.requester_id,
            created_at: self.clock.now(),
            location: request.location,
            issue_type: request.issue_type,
            photo_url: request.photo_url,
            additional_details: request.additional_details,
            location_context: request.location_context,
            extended: request.extended,
            status: RescueStatus::Pending,
            helper_id: None,
            source: APP_SOURCE.to_string(),
        };
        self.rescues.insert(record.id, encode(&record)?);
        info!(
            rescue_id = %record.id,
            requester_id = %record.requester_id,
            "rescue document created"
        );

        self.notify_rescues(None, Some(&record));
        Ok(record.id)
    }

    async fn get_rescue(&self, id: Uuid) -> Result<Option<RescueRequest>> {
        self.ensure_online().map_err(|e| AppError::Internal(e.into()))?;
        Ok(self.load_rescue(id))
    }

    async fn watch_rescues(&self, query: RescueQuery) -> Result<LiveFeed<RescueRequest>> {
        self.ensure_online()
            .map_err(|e| AppError::SubscribeFailure(e.into()))?;

        let (tx, feed) = feed::channel();
        let mut watchers = lock(&self.rescue_watchers);
        tx.snapshot(self.rescue_snapshot(&query));
        debug!(?query, "rescue feed opened");
        watchers.push(RescueWatcher { query, tx });
        Ok(feed)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RescueStatus,
        helper_id: Option<String>,
    ) -> Result<()> {
        self.ensure_online()
            .map_err(|e| AppError::WriteFailure(e.into()))?;

        // The shard stays write-locked from read to write, so a concurrent
        // remove or update cannot land in between.
        let (before, after) = {
            let mut doc = self
                .rescues
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound("RescueRequest".into(), id.to_string()))?;
            let before: RescueRequest = decode(&id, doc.value()).ok_or_else(|| {
                AppError::Internal(format!("rescue document {id} is malformed"))
            })?;
            if !before.status.advances_to(status) {
                return Err(ValidationError::InvalidTransition {
                    from: before.status,
                    to: status,
                }
                .into());
            }
            let mut after = before.clone();
            after.status = status;
            if helper_id.is_some() {
                after.helper_id = helper_id;
            }
            *doc.value_mut() = encode(&after)?;
            (before, after)
        };
        info!(rescue_id = %id, from = %before.status, to = %status, "rescue status updated");

        self.notify_rescues(Some(&before), Some(&after));
        Ok(())
    }

    async fn remove_rescue(&self, id: Uuid) -> Result<()> {
        self.ensure_online()
            .map_err(|e| AppError::WriteFailure(e.into()))?;

        // Takes the same shard lock as `update_status`.
        let (_, doc) = self
            .rescues
            .remove(&id)
            .ok_or_else(|| AppError::NotFound("RescueRequest".into(), id.to_string()))?;
        info!(rescue_id = %id, "rescue document removed");

        let before: Option<RescueRequest> = decode(&id, &doc);
        self.notify_rescues(before.as_ref(), None);
        Ok(())
    }
}

#[async_trait]
impl CommentStore for MemoryDocumentStore {
    async fn create_comment(&self, comment: NewComment) -> Result<Uuid> {
        self.ensure_online()
            .map_err(|e| AppError::WriteFailure(e.into()))?;

        let record = Comment {
            id: Uuid::new_v4(),
            rescue_id: comment.rescue_id,
            user_id: comment.user_id,
            user_name: comment.user_name,
            comment_text: comment.comment_text,
            created_at: self.clock.now(),
            is_helper: false,
        };
        self.comments.insert(record.id, encode(&record)?);
        info!(comment_id = %record.id, rescue_id = %record.rescue_id, "comment document created");

        self.notify_comments(record.rescue_id);
        Ok(record.id)
    }

    async fn watch_comments(&self, rescue_id: Uuid) -> Result<LiveFeed<Comment>> {
        self.ensure_online()
            .map_err(|e| AppError::SubscribeFailure(e.into()))?;

        let (tx, feed) = feed::channel();
        let mut watchers = lock(&self.comment_watchers);
        tx.snapshot(self.comment_snapshot(rescue_id));
        debug!(%rescue_id, "comment feed opened");
        watchers.push(CommentWatcher { rescue_id, tx });
        Ok(feed)
    }
}
