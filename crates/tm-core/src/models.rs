//! # Domain Models
//!
//! These structs represent the records TrailMate keeps in the document store.
//! Identifiers are store-assigned UUIDs; user identities are the opaque
//! strings issued by the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Latitude/longitude pair as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both coordinates fall in their WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// What went wrong on the trail. Persisted as its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueType {
    #[serde(rename = "Stuck in mud")]
    StuckInMud,
    #[serde(rename = "Flat tire")]
    FlatTire,
    #[serde(rename = "Mechanical")]
    Mechanical,
    #[serde(rename = "Snow/ice")]
    SnowIce,
}

impl IssueType {
    pub const ALL: [IssueType; 4] = [
        IssueType::StuckInMud,
        IssueType::FlatTire,
        IssueType::Mechanical,
        IssueType::SnowIce,
    ];

    /// Short key used by the issue picker.
    pub fn key(&self) -> &'static str {
        match self {
            IssueType::StuckInMud => "mud",
            IssueType::FlatTire => "tire",
            IssueType::Mechanical => "mechanical",
            IssueType::SnowIce => "snow",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IssueType::StuckInMud => "Stuck in mud",
            IssueType::FlatTire => "Flat tire",
            IssueType::Mechanical => "Mechanical",
            IssueType::SnowIce => "Snow/ice",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IssueType {
    type Err = String;

    /// Accepts either the picker key or the display label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        IssueType::ALL
            .into_iter()
            .find(|t| {
                t.key().eq_ignore_ascii_case(wanted) || t.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("unknown issue type: {s}"))
    }
}

/// Lifecycle of a rescue request. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RescueStatus {
    #[default]
    Pending,
    Accepted,
    Completed,
}

impl RescueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescueStatus::Pending => "pending",
            RescueStatus::Accepted => "accepted",
            RescueStatus::Completed => "completed",
        }
    }

    /// Pending and accepted requests still need attention.
    pub fn is_active(&self) -> bool {
        matches!(self, RescueStatus::Pending | RescueStatus::Accepted)
    }

    fn rank(&self) -> u8 {
        match self {
            RescueStatus::Pending => 0,
            RescueStatus::Accepted => 1,
            RescueStatus::Completed => 2,
        }
    }

    /// pending -> accepted -> completed, one step at a time.
    pub fn advances_to(&self, next: RescueStatus) -> bool {
        next.rank() == self.rank() + 1
    }
}

impl fmt::Display for RescueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recovery equipment the requester has on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoveryGear {
    Winch,
    #[serde(rename = "Tow straps")]
    TowStraps,
    Shovel,
    #[serde(rename = "Traction boards")]
    TractionBoards,
    Jack,
    None,
}

/// Whether the vehicle can still move under its own power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanMove {
    Yes,
    No,
    #[default]
    Unknown,
}

/// Conditional details shown only for some issues. Either present as a whole
/// or absent as a whole.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtendedDetails {
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub recovery_gear: Vec<RecoveryGear>,
    pub num_people: Option<u32>,
    #[serde(default)]
    pub can_move: CanMove,
    pub cell_reception: Option<String>,
    pub snow_depth_cm: Option<u32>,
}

/// A single help call as persisted in the `rescues` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescueRequest {
    pub id: Uuid,
    pub requester_id: String,
    pub created_at: DateTime<Utc>,
    pub location: GeoPoint,
    pub issue_type: IssueType,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub additional_details: String,
    #[serde(default)]
    pub location_context: String,
    pub extended: Option<ExtendedDetails>,
    #[serde(default)]
    pub status: RescueStatus,
    pub helper_id: Option<String>,
    pub source: String,
}

/// Form payload for a new rescue request, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RescueRequestInput {
    pub requester_id: String,
    pub location: Option<GeoPoint>,
    pub issue_type: Option<IssueType>,
    pub photo_url: Option<String>,
    pub additional_details: String,
    pub location_context: String,
    pub extended: Option<ExtendedDetails>,
}

/// A validated rescue request ready to be written. The store assigns the id,
/// creation time, status and helper.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRescueRequest {
    pub requester_id: String,
    pub location: GeoPoint,
    pub issue_type: IssueType,
    pub photo_url: Option<String>,
    pub additional_details: String,
    pub location_context: String,
    pub extended: Option<ExtendedDetails>,
}

/// A message on a rescue thread, persisted in the `comments` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    /// Foreign key by convention only.
    pub rescue_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub comment_text: String,
    pub created_at: DateTime<Utc>,
    pub is_helper: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentInput {
    pub rescue_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub comment_text: String,
}

/// A validated comment. `is_helper` is always written as false.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub rescue_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub comment_text: String,
}

/// Identity issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub phone_number: Option<String>,
}

impl Session {
    /// Display name derived from an email: its local part, or "Anonymous".
    pub fn default_display_name(email: &str) -> String {
        match email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => "Anonymous".to_string(),
        }
    }
}

/// Outcome of a runtime permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// A local file chosen through the device media picker.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedMedia {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub bytes: bytes::Bytes,
}

impl PickedMedia {
    /// File extension taken from the file name, falling back to the mime subtype.
    pub fn extension(&self) -> String {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => self.content_type.subtype().as_str().to_string(),
        }
    }
}

/// Standing queries over the `rescues` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescueQuery {
    /// Every request, newest first.
    All,
    /// Requests whose status is one of the given values, newest first.
    StatusIn(Vec<RescueStatus>),
}

impl RescueQuery {
    pub fn matches(&self, request: &RescueRequest) -> bool {
        match self {
            RescueQuery::All => true,
            RescueQuery::StatusIn(set) => set.contains(&request.status),
        }
    }
}
