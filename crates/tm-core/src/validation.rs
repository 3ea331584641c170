//! Client-side checks run before any write reaches the store.

use crate::error::ValidationError;
use crate::models::{CommentInput, NewComment, NewRescueRequest, RescueRequestInput};

pub const MAX_DETAILS_LEN: usize = 120;
pub const MAX_LOCATION_CONTEXT_LEN: usize = 200;
pub const MAX_COMMENT_LEN: usize = 500;
pub const MIN_PASSWORD_LEN: usize = 6;

impl RescueRequestInput {
    /// Checks required fields and text limits. Limits count characters, not bytes.
    pub fn validate(self) -> Result<NewRescueRequest, ValidationError> {
        let location = self.location.ok_or(ValidationError::MissingLocation)?;
        if !location.is_valid() {
            return Err(ValidationError::InvalidCoordinates);
        }
        let issue_type = self.issue_type.ok_or(ValidationError::MissingIssueType)?;

        if self.additional_details.chars().count() > MAX_DETAILS_LEN {
            return Err(ValidationError::DetailsTooLong { max: MAX_DETAILS_LEN });
        }
        if self.location_context.chars().count() > MAX_LOCATION_CONTEXT_LEN {
            return Err(ValidationError::LocationContextTooLong {
                max: MAX_LOCATION_CONTEXT_LEN,
            });
        }

        Ok(NewRescueRequest {
            requester_id: self.requester_id,
            location,
            issue_type,
            photo_url: self.photo_url,
            additional_details: self.additional_details,
            location_context: self.location_context,
            extended: self.extended,
        })
    }
}

impl CommentInput {
    /// Trims the text; whitespace-only comments are rejected.
    pub fn validate(self) -> Result<NewComment, ValidationError> {
        let text = self.comment_text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyComment);
        }
        if text.chars().count() > MAX_COMMENT_LEN {
            return Err(ValidationError::CommentTooLong { max: MAX_COMMENT_LEN });
        }
        Ok(NewComment {
            rescue_id: self.rescue_id,
            user_id: self.user_id,
            user_name: self.user_name,
            comment_text: text.to_string(),
        })
    }
}

/// Loose shape check: one '@', non-empty local part, dotted domain.
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
        && !email.chars().any(char::is_whitespace)
}
