//! User-facing failure messages. Every caught error becomes one modal alert;
//! the underlying error is kept for diagnostics only.

use tm_core::error::{AppError, AuthFailureKind, ValidationError};
use tm_core::validation::{MAX_COMMENT_LEN, MAX_DETAILS_LEN, MAX_LOCATION_CONTEXT_LEN};
use tracing::warn;

/// What the user was doing when the failure happened. Selects the wording of
/// write and auth failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SignUp,
    SignIn,
    SignOut,
    Locate,
    PickPhoto,
    SubmitRescue,
    OpenThread,
    PostComment,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{title}: {message}")]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub cause: Option<AppError>,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Confirmation shown after a request is written.
    pub fn request_sent() -> Self {
        Self::new("Rescue Request Sent", "Your rescue request has been broadcast.")
    }

    /// Converts a caught error into its alert and leaves a diagnostic trace.
    pub fn from_error(action: Action, err: AppError) -> Self {
        warn!(?action, error = %err, "operation failed");
        let (title, message) = wording(action, &err);
        Self {
            title: title.to_string(),
            message,
            cause: Some(err),
        }
    }
}

fn wording(action: Action, err: &AppError) -> (&'static str, String) {
    match err {
        AppError::Validation(v) => validation_wording(v),
        AppError::PermissionDenied(_) => match action {
            Action::Locate | Action::SubmitRescue => (
                "Location Required",
                "Permission to access location was denied.".into(),
            ),
            Action::PickPhoto => (
                "Permission Required",
                "Camera and photo library access is needed to add photos to your rescue request."
                    .into(),
            ),
            _ => ("Permission Required", "Permission was denied.".into()),
        },
        AppError::AuthFailure(kind) => auth_wording(action, *kind),
        AppError::NotFound(..) => ("Not Found", "Thread not found".into()),
        AppError::UploadFailure(_)
        | AppError::WriteFailure(_)
        | AppError::SubscribeFailure(_)
        | AppError::Internal(_) => ("Error", action_failure(action).into()),
    }
}

fn action_failure(action: Action) -> &'static str {
    match action {
        Action::SubmitRescue => "Failed to submit rescue request.",
        Action::PostComment => "Failed to post comment. Please try again.",
        Action::SignOut => "Failed to sign out. Please try again.",
        Action::SignUp => "Failed to create account. Please try again.",
        Action::SignIn => "Failed to sign in. Please try again.",
        Action::Locate => "Could not get your location.",
        Action::PickPhoto => "Could not open the photo library.",
        Action::OpenThread => "Could not load this thread.",
    }
}

fn validation_wording(err: &ValidationError) -> (&'static str, String) {
    match err {
        ValidationError::MissingLocation => {
            ("Missing Location", "Could not get your location.".into())
        }
        ValidationError::MissingIssueType => {
            ("Missing Issue", "Please select the issue type.".into())
        }
        ValidationError::InvalidCoordinates => {
            ("Invalid Location", "The location is out of range.".into())
        }
        ValidationError::DetailsTooLong { .. } => (
            "Too Long",
            format!("Additional details are limited to {MAX_DETAILS_LEN} characters."),
        ),
        ValidationError::LocationContextTooLong { .. } => (
            "Too Long",
            format!("How you got here is limited to {MAX_LOCATION_CONTEXT_LEN} characters."),
        ),
        ValidationError::EmptyComment => ("Empty Comment", "Please write a comment first.".into()),
        ValidationError::CommentTooLong { .. } => (
            "Too Long",
            format!("Comments are limited to {MAX_COMMENT_LEN} characters."),
        ),
        ValidationError::InvalidTransition { .. } => {
            ("Error", "This request can no longer change to that status.".into())
        }
        ValidationError::Busy => ("Please Wait", "A submission is already in progress.".into()),
    }
}

fn auth_wording(action: Action, kind: AuthFailureKind) -> (&'static str, String) {
    let title = match action {
        Action::SignUp => "Sign Up Failed",
        Action::SignIn => "Sign In Failed",
        _ => "Error",
    };
    let message = match kind {
        AuthFailureKind::MissingFields => {
            return ("Missing Information", "Please fill in all fields.".into());
        }
        AuthFailureKind::WeakPassword => {
            return ("Weak Password", "Password should be at least 6 characters.".into());
        }
        AuthFailureKind::InvalidEmail => "Please enter a valid email address.",
        AuthFailureKind::EmailInUse => "An account with this email already exists.",
        AuthFailureKind::UserNotFound => "No account found with this email.",
        AuthFailureKind::WrongPassword => "Incorrect password.",
    };
    (title, message.into())
}
