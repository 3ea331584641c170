//! # AppError
//!
//! Centralized error handling for TrailMate.
//! Every failure is caught where the operation runs and surfaced as one
//! user-facing message; nothing here is retried.

use crate::models::RescueStatus;
use thiserror::Error;

/// Why the identity provider refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    MissingFields,
    InvalidEmail,
    WeakPassword,
    EmailInUse,
    UserNotFound,
    WrongPassword,
}

impl std::fmt::Display for AuthFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AuthFailureKind::MissingFields => "missing fields",
            AuthFailureKind::InvalidEmail => "invalid email",
            AuthFailureKind::WeakPassword => "weak password",
            AuthFailureKind::EmailInUse => "email already in use",
            AuthFailureKind::UserNotFound => "user not found",
            AuthFailureKind::WrongPassword => "wrong password",
        };
        f.write_str(text)
    }
}

/// Client-side rejections raised before anything is written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("location is required")]
    MissingLocation,

    #[error("issue type is required")]
    MissingIssueType,

    #[error("coordinates out of range")]
    InvalidCoordinates,

    #[error("additional details exceed {max} characters")]
    DetailsTooLong { max: usize },

    #[error("location context exceeds {max} characters")]
    LocationContextTooLong { max: usize },

    #[error("comment is empty")]
    EmptyComment,

    #[error("comment exceeds {max} characters")]
    CommentTooLong { max: usize },

    #[error("status cannot move from {from} to {to}")]
    InvalidTransition { from: RescueStatus, to: RescueStatus },

    #[error("a submission is already in progress")]
    Busy,
}

/// The primary error type for all TrailMate operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Location, camera, media library or notifications refused by the user.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Bad credentials, duplicate account, weak password.
    #[error("authentication failed: {0}")]
    AuthFailure(AuthFailureKind),

    /// The document store rejected or never received a write.
    #[error("write failed: {0}")]
    WriteFailure(String),

    /// The media store rejected an upload.
    #[error("upload failed: {0}")]
    UploadFailure(String),

    /// A live feed could not be established or was broken by the store.
    #[error("subscription failed: {0}")]
    SubscribeFailure(String),

    /// Record does not exist (e.g. a request removed before it was opened).
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Infrastructure failure with no better classification.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for TrailMate logic.
pub type Result<T> = std::result::Result<T, AppError>;
