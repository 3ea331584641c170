//! # Rescue Form
//!
//! Draft state behind the "request help" screen and the submit sequence:
//! validate, upload the photo if one was picked, then write the request.
//! Nothing is written when validation fails, and an upload failure writes
//! nothing either.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tm_core::error::{AppError, ValidationError};
use tm_core::models::{ExtendedDetails, GeoPoint, IssueType, PickedMedia, RescueRequestInput};
use tm_core::traits::{LocationProvider, MediaPicker, MediaStore};
use tm_core::validation::{MAX_DETAILS_LEN, MAX_LOCATION_CONTEXT_LEN};
use tracing::{debug, info};
use uuid::Uuid;

use super::{lock, BusyFlag};
use crate::alert::{Action, Alert};
use crate::repository::RequestRepository;
use crate::session::SessionContext;
use crate::AppServices;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RescueDraft {
    pub location: Option<GeoPoint>,
    pub issue_type: Option<IssueType>,
    pub photo: Option<PickedMedia>,
    pub details: String,
    pub location_context: String,
    pub extended: Option<ExtendedDetails>,
}

/// Storage path for a request photo.
pub fn photo_path(user_id: &str, millis: i64, ext: &str) -> String {
    format!("rescues/{user_id}_{millis}.{ext}")
}

pub struct RescueFormController {
    requests: RequestRepository,
    media: Arc<dyn MediaStore>,
    location: Arc<dyn LocationProvider>,
    picker: Arc<dyn MediaPicker>,
    session: SessionContext,
    draft: Mutex<RescueDraft>,
    submitting: BusyFlag,
}

impl RescueFormController {
    pub fn new(services: &AppServices, session: SessionContext) -> Self {
        Self {
            requests: services.request_repository(),
            media: services.media.clone(),
            location: services.location.clone(),
            picker: services.picker.clone(),
            session,
            draft: Mutex::new(RescueDraft::default()),
            submitting: BusyFlag::default(),
        }
    }

    /// Asks for location permission and records the current fix.
    pub async fn acquire_location(&self) -> Result<GeoPoint, Alert> {
        if !self.location.request_permission().await.is_granted() {
            return Err(Alert::from_error(
                Action::Locate,
                AppError::PermissionDenied("location".into()),
            ));
        }
        let point = self
            .location
            .current_position()
            .await
            .map_err(|e| Alert::from_error(Action::Locate, e))?;
        debug!(location = %point, "location acquired");
        lock(&self.draft).location = Some(point);
        Ok(point)
    }

    pub fn set_location(&self, point: GeoPoint) {
        lock(&self.draft).location = Some(point);
    }

    pub fn select_issue(&self, issue: IssueType) {
        lock(&self.draft).issue_type = Some(issue);
    }

    /// Input past the limit is refused, as a capped text field would.
    pub fn set_details(&self, text: &str) -> bool {
        if text.chars().count() > MAX_DETAILS_LEN {
            return false;
        }
        lock(&self.draft).details = text.to_string();
        true
    }

    pub fn set_location_context(&self, text: &str) -> bool {
        if text.chars().count() > MAX_LOCATION_CONTEXT_LEN {
            return false;
        }
        lock(&self.draft).location_context = text.to_string();
        true
    }

    pub fn set_extended(&self, extended: Option<ExtendedDetails>) {
        lock(&self.draft).extended = extended;
    }

    /// `Ok(false)` when the picker was cancelled.
    pub async fn pick_photo(&self) -> Result<bool, Alert> {
        if !self.picker.request_permission().await.is_granted() {
            return Err(Alert::from_error(
                Action::PickPhoto,
                AppError::PermissionDenied("media library".into()),
            ));
        }
        match self.picker.pick_image().await {
            Ok(Some(photo)) => {
                debug!(file = %photo.file_name, "photo attached");
                lock(&self.draft).photo = Some(photo);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(Alert::from_error(Action::PickPhoto, e)),
        }
    }

    pub fn draft(&self) -> RescueDraft {
        lock(&self.draft).clone()
    }

    /// Location and issue are both set and nothing is in flight.
    pub fn can_submit(&self) -> bool {
        let draft = lock(&self.draft);
        draft.location.is_some() && draft.issue_type.is_some() && !self.submitting.is_set()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_set()
    }

    /// Broadcasts the draft. On success the draft is cleared and the caller
    /// shows `Alert::request_sent`; on failure the draft is left as it was.
    pub async fn submit(&self) -> Result<Uuid, Alert> {
        let Some(_guard) = self.submitting.try_begin() else {
            return Err(Alert::from_error(Action::SubmitRescue, ValidationError::Busy.into()));
        };
        let draft = self.draft();
        let mut input = RescueRequestInput {
            requester_id: self.session.user_id().to_string(),
            location: draft.location,
            issue_type: draft.issue_type,
            photo_url: None,
            additional_details: draft.details.trim().to_string(),
            location_context: draft.location_context.trim().to_string(),
            extended: draft.extended,
        };
        // An invalid draft uploads nothing.
        input
            .clone()
            .validate()
            .map_err(|e| Alert::from_error(Action::SubmitRescue, e.into()))?;

        if let Some(photo) = draft.photo {
            let path = photo_path(
                self.session.user_id(),
                Utc::now().timestamp_millis(),
                &photo.extension(),
            );
            let url = self
                .media
                .upload(photo.bytes, &path, &photo.content_type)
                .await
                .map_err(|e| Alert::from_error(Action::SubmitRescue, e))?;
            info!(%path, "rescue photo uploaded");
            input.photo_url = Some(url);
        }

        let id = self
            .requests
            .create(input)
            .await
            .map_err(|e| Alert::from_error(Action::SubmitRescue, e))?;
        *lock(&self.draft) = RescueDraft::default();
        Ok(id)
    }
}
