//! # tm-app
//!
//! The orchestration layer for TrailMate: repositories over the document
//! store, live subscriptions, the session context and the controllers that
//! back each screen.

pub mod alert;
pub mod controllers;
pub mod format;
pub mod repository;
pub mod session;
pub mod subscription;

use std::sync::Arc;

use tm_core::traits::{
    CommentStore, IdentityProvider, LocationProvider, MediaPicker, MediaStore, RescueStore,
};

pub use alert::{Action, Alert};
pub use repository::{CommentRepository, RequestRepository};
pub use session::SessionContext;
pub use subscription::{Observer, Subscription, SubscriptionRegistry};

/// External collaborators, shared by every controller.
#[derive(Clone)]
pub struct AppServices {
    pub rescues: Arc<dyn RescueStore>,
    pub comments: Arc<dyn CommentStore>,
    pub media: Arc<dyn MediaStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub location: Arc<dyn LocationProvider>,
    pub picker: Arc<dyn MediaPicker>,
}

impl AppServices {
    pub fn request_repository(&self) -> RequestRepository {
        RequestRepository::new(self.rescues.clone())
    }

    pub fn comment_repository(&self) -> CommentRepository {
        CommentRepository::new(self.comments.clone())
    }
}
