//! # tm-device-sim
//!
//! Stand-ins for the device sensors: a location provider that answers with a
//! configured fix and a media picker that hands out queued photos. Permission
//! outcomes are configured up front so denial paths can be exercised.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use tm_core::error::{AppError, Result};
use tm_core::models::{GeoPoint, PermissionStatus, PickedMedia};
use tm_core::traits::{LocationProvider, MediaPicker};
use tracing::{debug, info};

/// Squamish forest service roads, the app's default map centre.
pub const DEFAULT_POSITION: GeoPoint = GeoPoint {
    latitude: 49.7312,
    longitude: -123.1552,
};

pub struct FixedLocationProvider {
    position: Option<GeoPoint>,
    permission: PermissionStatus,
}

impl FixedLocationProvider {
    pub fn new(position: GeoPoint, permission: PermissionStatus) -> Self {
        Self {
            position: Some(position),
            permission,
        }
    }

    /// Permission granted but no fix available.
    pub fn without_fix() -> Self {
        Self {
            position: None,
            permission: PermissionStatus::Granted,
        }
    }
}

impl Default for FixedLocationProvider {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION, PermissionStatus::Granted)
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn request_permission(&self) -> PermissionStatus {
        debug!(permission = ?self.permission, "location permission prompt");
        self.permission
    }

    async fn current_position(&self) -> Result<GeoPoint> {
        if !self.permission.is_granted() {
            return Err(AppError::PermissionDenied("location".into()));
        }
        self.position
            .ok_or_else(|| AppError::Internal("no location fix available".into()))
    }
}

pub struct ScriptedMediaPicker {
    permission: PermissionStatus,
    queue: Mutex<VecDeque<PickedMedia>>,
}

impl ScriptedMediaPicker {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            permission,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Queues a photo for the next pick.
    pub fn push(&self, media: PickedMedia) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(media);
    }

    /// Queues a photo read from disk, typed by its extension.
    pub async fn push_file(&self, path: &Path) -> anyhow::Result<()> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        info!(file = %file_name, %content_type, bytes = data.len(), "photo queued");
        self.push(PickedMedia {
            file_name,
            content_type,
            bytes: Bytes::from(data),
        });
        Ok(())
    }
}

impl Default for ScriptedMediaPicker {
    fn default() -> Self {
        Self::new(PermissionStatus::Granted)
    }
}

#[async_trait]
impl MediaPicker for ScriptedMediaPicker {
    async fn request_permission(&self) -> PermissionStatus {
        debug!(permission = ?self.permission, "media permission prompt");
        self.permission
    }

    async fn pick_image(&self) -> Result<Option<PickedMedia>> {
        if !self.permission.is_granted() {
            return Err(AppError::PermissionDenied("media library".into()));
        }
        // An empty queue is a cancelled picker.
        Ok(self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front())
    }
}
