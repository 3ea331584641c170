//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be wired into the app.
//! Everything behind them is an external capability provider: a hosted
//! document store, a media bucket, an identity service and device sensors.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::feed::LiveFeed;
use crate::models::{
    Comment, GeoPoint, NewComment, NewRescueRequest, PermissionStatus, PickedMedia, RescueQuery,
    RescueRequest, RescueStatus, Session,
};

/// The `rescues` collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RescueStore: Send + Sync {
    /// Writes one document. The store assigns id, creation time, `pending`
    /// status and an empty helper.
    async fn create_rescue(&self, request: NewRescueRequest) -> Result<Uuid>;

    /// Single-shot read.
    async fn get_rescue(&self, id: Uuid) -> Result<Option<RescueRequest>>;

    /// Standing query, newest first.
    async fn watch_rescues(&self, query: RescueQuery) -> Result<LiveFeed<RescueRequest>>;

    /// Helper-side mutation: accept or complete a request.
    async fn update_status(
        &self,
        id: Uuid,
        status: RescueStatus,
        helper_id: Option<String>,
    ) -> Result<()>;

    async fn remove_rescue(&self, id: Uuid) -> Result<()>;
}

/// The `comments` collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Writes one document with a store-assigned id and creation time.
    async fn create_comment(&self, comment: NewComment) -> Result<Uuid>;

    /// Standing equality query on `rescue_id`. Result order is unspecified.
    async fn watch_comments(&self, rescue_id: Uuid) -> Result<LiveFeed<Comment>>;
}

/// Media storage contract for photo uploads.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the bytes under `path` and returns a retrieval URL.
    async fn upload(&self, data: Bytes, path: &str, content_type: &mime::Mime) -> Result<String>;
}

/// Identity contract. The app reads sessions but never holds credentials.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, phone_number: &str) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    fn current_session(&self) -> Option<Session>;

    /// Yields every session transition, starting from the current one.
    fn watch_session(&self) -> watch::Receiver<Option<Session>>;
}

/// One-shot high-accuracy position fetch, gated by a permission prompt.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_position(&self) -> Result<GeoPoint>;
}

/// Photo library / camera picker, gated by a permission prompt.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaPicker: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    /// `None` when the user cancels the picker.
    async fn pick_image(&self) -> Result<Option<PickedMedia>>;
}
